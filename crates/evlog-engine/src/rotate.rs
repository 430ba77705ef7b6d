//! Size-based rotation and archive retention
//!
//! A file over the size threshold is renamed into `archive/<YYYY-MM>/`
//! in one step. Its last `keep_lines` lines are staged next to it and
//! linked back into place only if no writer has recreated the path in the
//! meantime. Writers release their handles on every flush, so lines
//! written through a stale handle land in the archived copy.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use evlog_config::Config;
use evlog_core::layout::{COMPRESSED_EXTENSION, LOG_EXTENSION, is_log_file, is_month_key};
use evlog_core::{LogLayout, timestamp};
use evlog_storage::{ArchivedMonth, IndexedStore};
use time::Duration;
use tracing::{debug, info, warn};

use crate::{EngineError, Result};

const ZSTD_LEVEL: i32 = 3;

/// What happened to one rotated file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatedFile {
    pub source: PathBuf,
    pub archive: PathBuf,
    pub archived_bytes: u64,
    /// Lines left in the active file; 0 if a writer recreated it first
    pub kept_lines: usize,
}

pub struct RotationManager {
    layout: LogLayout,
    max_size_bytes: u64,
    keep_lines: usize,
    compress: bool,
}

impl RotationManager {
    pub fn new(layout: LogLayout, max_size_bytes: u64, keep_lines: usize, compress: bool) -> Self {
        Self {
            layout,
            max_size_bytes,
            keep_lines,
            compress,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            LogLayout::new(&config.log_dir),
            config.max_size_bytes(),
            config.rotation.keep_lines,
            config.rotation.compress,
        )
    }

    /// Active `.jsonl` files larger than the threshold, sorted.
    pub async fn scan(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(self.layout.root()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut oversized = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_log_file(&path) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if metadata.is_file() && metadata.len() > self.max_size_bytes {
                oversized.push(path);
            }
        }
        oversized.sort();
        Ok(oversized)
    }

    pub async fn rotate_all(&self) -> Result<Vec<RotatedFile>> {
        let mut rotated = Vec::new();
        for path in self.scan().await? {
            rotated.push(self.rotate(&path).await?);
        }
        if rotated.is_empty() {
            debug!("No files over {} bytes", self.max_size_bytes);
        }
        Ok(rotated)
    }

    pub async fn rotate(&self, path: &Path) -> Result<RotatedFile> {
        let stem = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) if is_log_file(path) => stem.to_string(),
            _ => return Err(EngineError::NotALogFile(path.to_path_buf())),
        };

        // 1. Move the whole file into this month's bucket
        let now = timestamp::now();
        let bucket = self.layout.month_bucket(&timestamp::month_key(now));
        tokio::fs::create_dir_all(&bucket).await?;

        let archive = unique_archive_path(&bucket, &stem, &timestamp::date_key(now));
        tokio::fs::rename(path, &archive).await?;
        let archived_bytes = tokio::fs::metadata(&archive).await?.len();

        // 2. Put the retained tail back unless a writer got there first
        let kept_lines = if self.keep_lines > 0 {
            self.restore_tail(path, &archive).await?
        } else {
            0
        };

        // 3. Compress
        let archive = if self.compress {
            compress(archive).await?
        } else {
            archive
        };

        info!(
            "Rotated {} ({} bytes) -> {}",
            path.display(),
            archived_bytes,
            archive.display()
        );

        Ok(RotatedFile {
            source: path.to_path_buf(),
            archive,
            archived_bytes,
            kept_lines,
        })
    }

    async fn restore_tail(&self, path: &Path, archive: &Path) -> Result<usize> {
        let content = tokio::fs::read(archive).await?;
        let (tail, lines) = last_lines(&content, self.keep_lines);
        if lines == 0 {
            return Ok(0);
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staged = path.with_file_name(format!(".{file_name}.retain"));
        tokio::fs::write(&staged, tail).await?;

        let linked = tokio::fs::hard_link(&staged, path).await;
        tokio::fs::remove_file(&staged).await?;

        match linked {
            Ok(()) => Ok(lines),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(
                    "{} was recreated during rotation, not restoring its last {} lines",
                    path.display(),
                    lines
                );
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Keep the `keep` newest month buckets under `archive/` and delete the
    /// rest. Returns the removed month keys, oldest first.
    pub async fn clean_old_archives(&self, keep: usize) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(self.layout.archive_root()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut months = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_month_key(&name) && entry.file_type().await?.is_dir() {
                months.push(name);
            }
        }
        months.sort_unstable_by(|a, b| b.cmp(a));

        let mut removed: Vec<String> = months.into_iter().skip(keep).collect();
        removed.reverse();
        for month in &removed {
            tokio::fs::remove_dir_all(self.layout.month_bucket(month)).await?;
            info!("Removed archive bucket {}", month);
        }
        Ok(removed)
    }

    /// Move store rows older than `retention_days` into
    /// `archive/logs-<YYYY-MM>.db`.
    pub async fn archive_old_rows(
        &self,
        store: &IndexedStore,
        retention_days: u32,
    ) -> Result<Vec<ArchivedMonth>> {
        let cutoff = timestamp::now() - Duration::days(i64::from(retention_days));
        let archived = store
            .archive_rows_before(cutoff, |month| self.layout.archive_db(month))
            .await?;
        if archived.is_empty() {
            debug!("No rows older than {} days", retention_days);
        }
        Ok(archived)
    }
}

/// `<stem>.<date>.jsonl`, or `<stem>.<date>.<n>.jsonl` for the first free
/// `n` when that name (or its compressed form) is taken.
fn unique_archive_path(bucket: &Path, stem: &str, date: &str) -> PathBuf {
    let taken = |path: &Path| path.exists() || compressed_path(path).exists();

    let first = bucket.join(format!("{stem}.{date}.{LOG_EXTENSION}"));
    if !taken(&first) {
        return first;
    }
    (1..)
        .map(|n| bucket.join(format!("{stem}.{date}.{n}.{LOG_EXTENSION}")))
        .find(|p| !taken(p))
        .unwrap_or(first)
}

fn compressed_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(COMPRESSED_EXTENSION);
    PathBuf::from(name)
}

/// The last `n` lines of `content` (a trailing line without a newline
/// counts) and how many lines that is.
fn last_lines(content: &[u8], n: usize) -> (&[u8], usize) {
    if n == 0 || content.is_empty() {
        return (&[], 0);
    }

    // ignore the terminator of the final line
    let body = content.strip_suffix(b"\n").unwrap_or(content);
    let mut start = 0;
    let mut seen = 1;
    for (i, byte) in body.iter().enumerate().rev() {
        if *byte == b'\n' {
            if seen == n {
                start = i + 1;
                break;
            }
            seen += 1;
        }
    }
    (&content[start..], seen)
}

/// zstd-compress `archive` to `<archive>.zst` and remove the original. On
/// failure the uncompressed archive is kept.
async fn compress(archive: PathBuf) -> Result<PathBuf> {
    let target = compressed_path(&archive);
    let (source, dest) = (archive.clone(), target.clone());

    let result = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let input = std::fs::File::open(&source)?;
        let output = std::fs::File::create(&dest)?;
        zstd::stream::copy_encode(input, output, ZSTD_LEVEL)?;
        std::fs::remove_file(&source)
    })
    .await?;

    match result {
        Ok(()) => Ok(target),
        Err(e) => {
            warn!("Failed to compress {}: {}", archive.display(), e);
            let _ = tokio::fs::remove_file(&target).await;
            Ok(archive)
        }
    }
}
