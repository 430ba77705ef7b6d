use anyhow::{Context, bail};
use evlog_core::Level;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for evlog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_min_level")]
    pub min_level: Level,

    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    #[serde(default)]
    pub rotation: RotationConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub raw_sources: Vec<RawSourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,

    /// Lines left in the active file after it is rotated
    #[serde(default = "default_keep_lines")]
    pub keep_lines: usize,

    /// Month buckets kept under `archive/`
    #[serde(default = "default_keep_months")]
    pub keep_months: usize,

    #[serde(default = "default_db_retention_days")]
    pub db_retention_days: u32,

    #[serde(default = "default_true")]
    pub compress: bool,

    #[serde(default = "default_true")]
    pub ingest_before_rotate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_tail_poll_ms")]
    pub tail_poll_ms: u64,
}

/// A plain-text log picked up by the ingestor alongside the JSONL streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSourceConfig {
    pub name: String,
    pub glob: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            db_path: default_db_path(),
            min_level: default_min_level(),
            flush_interval_ms: default_flush_interval_ms(),
            rotation: RotationConfig::default(),
            ingest: IngestConfig::default(),
            query: QueryConfig::default(),
            raw_sources: Vec::new(),
        }
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_size_mb: default_max_size_mb(),
            keep_lines: default_keep_lines(),
            keep_months: default_keep_months(),
            db_retention_days: default_db_retention_days(),
            compress: true,
            ingest_before_rotate: true,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            tail_poll_ms: default_tail_poll_ms(),
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "evlog", "evlog")
}

fn default_log_dir() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.data_dir().join("logs"),
        None => PathBuf::from(".evlog/logs"),
    }
}

fn default_db_path() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.data_dir().join("logs.db"),
        None => PathBuf::from(".evlog/logs.db"),
    }
}

fn default_min_level() -> Level {
    Level::Info
}

fn default_flush_interval_ms() -> u64 {
    3000
}

fn default_max_size_mb() -> u64 {
    50
}

fn default_keep_lines() -> usize {
    1000
}

fn default_keep_months() -> usize {
    3
}

fn default_db_retention_days() -> u32 {
    90
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    1000
}

fn default_tail_poll_ms() -> u64 {
    500
}

impl Config {
    /// Load config from `path` (or the default location), writing a default
    /// file first if none exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path(),
        };

        let config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        } else {
            let config = Config::default();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let content = toml::to_string_pretty(&config)?;
            std::fs::write(&path, content)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Get config file path
    pub fn config_path() -> PathBuf {
        if let Some(dirs) = project_dirs() {
            dirs.config_dir().join("config.toml")
        } else {
            PathBuf::from("~/.evlog/config.toml")
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.flush_interval_ms == 0 {
            bail!("flush_interval_ms must be greater than zero");
        }
        if self.rotation.max_size_mb == 0 {
            bail!("rotation.max_size_mb must be greater than zero");
        }
        if self.rotation.keep_months == 0 {
            bail!("rotation.keep_months must be at least 1");
        }
        if self.ingest.batch_size == 0 {
            bail!("ingest.batch_size must be greater than zero");
        }
        if self.query.tail_poll_ms == 0 {
            bail!("query.tail_poll_ms must be greater than zero");
        }

        for (i, source) in self.raw_sources.iter().enumerate() {
            if source.name.trim().is_empty() {
                bail!("raw_sources[{i}] has an empty name");
            }
            if self.raw_sources[..i].iter().any(|s| s.name == source.name) {
                bail!("duplicate raw source name: {}", source.name);
            }
            glob::Pattern::new(&source.glob)
                .with_context(|| format!("raw source {} has an invalid glob", source.name))?;
            if let Some(pattern) = &source.pattern {
                regex::Regex::new(pattern)
                    .with_context(|| format!("raw source {} has an invalid pattern", source.name))?;
            }
        }

        Ok(())
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.rotation.max_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn tail_poll_interval(&self) -> Duration {
        Duration::from_millis(self.query.tail_poll_ms)
    }
}
