use std::io::SeekFrom;
use std::path::Path;

use evlog_core::Result;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader, Take};

/// Bytes of a file's head covered by [`fingerprint`].
pub const FINGERPRINT_BYTES: u64 = 256;

/// Reads newline-terminated lines from `[start, end)` of a file.
///
/// A trailing line without its newline is left unread, so [`LineReader::offset`]
/// always points just past the last complete line returned.
pub struct LineReader {
    reader: BufReader<Take<File>>,
    offset: u64,
    buf: Vec<u8>,
}

impl LineReader {
    pub async fn open(path: &Path, start: u64, end: u64) -> Result<Self> {
        let mut file = File::open(path).await?;
        file.seek(SeekFrom::Start(start)).await?;

        Ok(Self {
            reader: BufReader::new(file.take(end.saturating_sub(start))),
            offset: start,
            buf: Vec::new(),
        })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Next non-empty complete line, without its terminator.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            self.buf.clear();
            let n = self.reader.read_until(b'\n', &mut self.buf).await?;
            if n == 0 || self.buf.last() != Some(&b'\n') {
                return Ok(None);
            }
            self.offset += n as u64;

            let line = String::from_utf8_lossy(&self.buf);
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.trim().is_empty() {
                return Ok(Some(line.to_string()));
            }
        }
    }

    /// Up to `max` lines; fewer means the readable range is exhausted.
    pub async fn next_batch(&mut self, max: usize) -> Result<Vec<String>> {
        let mut lines = Vec::with_capacity(max.min(1024));
        while lines.len() < max {
            match self.next_line().await? {
                Some(line) => lines.push(line),
                None => break,
            }
        }
        Ok(lines)
    }
}

/// BLAKE3 of the first `min(len, 256)` bytes of a file.
///
/// Identifies a file's content independently of its path, so a file that
/// was replaced and regrew past an old offset is detected.
pub async fn fingerprint(path: &Path, len: u64) -> Result<String> {
    let file = File::open(path).await?;
    let mut head = Vec::new();
    file.take(len.min(FINGERPRINT_BYTES))
        .read_to_end(&mut head)
        .await?;
    Ok(blake3::hash(&head).to_hex().to_string())
}
