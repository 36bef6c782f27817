//! Process-wide limits and paths, fixed at startup.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Limits and paths used by every component.
///
/// Build it once with [`Config::load`] (or `Config::default()` plus
/// overrides followed by [`Config::validate`]) and share it behind an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sandbox root; every user-supplied path must resolve under it
    pub base_dir: Option<PathBuf>,

    /// Disable the sandbox entirely
    pub allow_any_path: bool,

    /// Directory receiving per-operation event logs
    pub log_dir: PathBuf,

    /// Maximum aggregate uncompressed size of one archive (default: 1 GB)
    pub max_total_size: u64,

    /// Maximum number of entries in one archive (default: 10,000)
    pub max_files: usize,

    /// Maximum uncompressed size of one entry (default: 100 MB)
    pub max_file_size: u64,

    /// Maximum uncompressed/compressed ratio of one entry (default: 200)
    pub max_compression_ratio: f64,

    /// Maximum size of the archive file itself (default: 2 GB)
    pub max_zip_size: u64,

    /// Worker pool size for parallel runs
    pub max_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: dirs::home_dir(),
            allow_any_path: false,
            log_dir: PathBuf::from("logs"),
            max_total_size: GIB,
            max_files: 10_000,
            max_file_size: 100 * MIB,
            max_compression_ratio: 200.0,
            max_zip_size: 2 * GIB,
            max_workers: default_max_workers(),
        }
    }
}

fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(4)
}

impl Config {
    /// Read `UNZIP_*` environment variables over the defaults, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_env()?;
        config.resolve_log_dir()?;
        config.validate()?;
        Ok(config)
    }

    /// Read `UNZIP_*` environment variables over the defaults without validating.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("UNZIP_BASE_DIR") {
            config.base_dir = Some(PathBuf::from(dir));
        }
        if let Some(flag) = lookup("UNZIP_ALLOW_ANY_PATH") {
            config.allow_any_path = parse_flag(&flag);
        }
        if let Some(dir) = lookup("UNZIP_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(v) = lookup("UNZIP_MAX_TOTAL_SIZE") {
            config.max_total_size = parse_number("UNZIP_MAX_TOTAL_SIZE", v)?;
        }
        if let Some(v) = lookup("UNZIP_MAX_FILES") {
            config.max_files = parse_number("UNZIP_MAX_FILES", v)?;
        }
        if let Some(v) = lookup("UNZIP_MAX_FILE_SIZE") {
            config.max_file_size = parse_number("UNZIP_MAX_FILE_SIZE", v)?;
        }
        if let Some(v) = lookup("UNZIP_MAX_COMPRESSION_RATIO") {
            config.max_compression_ratio = parse_number("UNZIP_MAX_COMPRESSION_RATIO", v)?;
        }
        if let Some(v) = lookup("UNZIP_MAX_ZIP_SIZE") {
            config.max_zip_size = parse_number("UNZIP_MAX_ZIP_SIZE", v)?;
        }
        if let Some(v) = lookup("UNZIP_MAX_WORKERS") {
            config.max_workers = parse_number("UNZIP_MAX_WORKERS", v)?;
        }

        Ok(config)
    }

    /// Expand a leading `~` and anchor a relative `log_dir` at the current directory.
    ///
    /// Done once at startup so log paths do not move with later directory changes.
    pub fn resolve_log_dir(&mut self) -> Result<(), ConfigError> {
        self.log_dir = absolute_dir(&self.log_dir).map_err(|source| ConfigError::LogDir {
            path: self.log_dir.clone(),
            source,
        })?;
        Ok(())
    }

    /// Reject non-positive limits and a missing sandbox root.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("max_total_size", self.max_total_size == 0),
            ("max_files", self.max_files == 0),
            ("max_file_size", self.max_file_size == 0),
            ("max_zip_size", self.max_zip_size == 0),
            ("max_workers", self.max_workers == 0),
            (
                "max_compression_ratio",
                !(self.max_compression_ratio.is_finite() && self.max_compression_ratio > 0.0),
            ),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, invalid)| *invalid) {
            return Err(ConfigError::NonPositiveLimit(*name));
        }

        if !self.allow_any_path {
            let root = self.base_dir.as_ref().ok_or(ConfigError::NoSandboxRoot)?;
            if !root.is_dir() {
                return Err(ConfigError::MissingSandboxRoot(root.clone()));
            }
        }

        Ok(())
    }
}

pub(crate) fn absolute_dir(path: &Path) -> io::Result<PathBuf> {
    let expanded = match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    };
    std::path::absolute(expanded)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { var, value })
}
