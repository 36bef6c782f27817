//! Append-only, human-readable operation log.

use crate::sanitize::sanitize_message;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// One log file per operation.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sanitize `message` and append it; failures are reported through tracing only.
    pub fn record(&self, message: &str) {
        if let Err(e) = append(&self.path, &sanitize_message(message)) {
            warn!(log = %self.path.display(), error = %e, "failed to append to event log");
        }
    }
}

/// Append one timestamped line, creating the log directory if missing.
pub fn append(log_path: &Path, message: &str) -> io::Result<()> {
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let mut file = OpenOptions::new().create(true).append(true).open(log_path)?;
    writeln!(file, "[{timestamp}] {message}")
}
