//! Type definitions shared by the engine, the registry and callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Individual entry within an archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Raw path of the entry within the archive
    pub name: String,

    /// Uncompressed size in bytes
    pub size: u64,

    /// Compressed size in bytes
    pub compressed_size: u64,

    /// Whether this entry is a directory
    pub is_directory: bool,

    /// Whether the stored unix mode marks this entry as a symbolic link
    pub is_symlink: bool,
}

/// Metadata information about an archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveInfo {
    /// Size of the archive file in bytes
    pub compressed_bytes: u64,

    /// Sum of the declared uncompressed sizes
    pub uncompressed_total: u64,

    /// List of all entries in the archive
    pub entries: Vec<ArchiveEntry>,
}

impl ArchiveInfo {
    /// Number of non-directory entries.
    pub fn file_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_directory).count()
    }
}

/// What to do when the natural extraction destination already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Leave the existing destination alone and report the archive as skipped
    #[default]
    Skip,

    /// Replace the existing destination once extraction succeeded
    Overwrite,

    /// Extract next to it as `name (1)`, `name (2)`, ...
    Suffix,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictPolicy::Skip => "skip",
            ConflictPolicy::Overwrite => "overwrite",
            ConflictPolicy::Suffix => "suffix",
        };
        f.write_str(name)
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(ConflictPolicy::Skip),
            "overwrite" => Ok(ConflictPolicy::Overwrite),
            "suffix" => Ok(ConflictPolicy::Suffix),
            other => Err(format!("Unknown conflict policy: {other}")),
        }
    }
}

/// Outcome of extracting one archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// The archive was committed to its destination
    Success {
        /// Number of files written
        files: u64,
        /// Total uncompressed bytes written
        bytes: u64,
        /// Directory the archive was committed to
        destination: PathBuf,
    },

    /// Nothing was written because of the conflict policy
    Skipped {
        /// Why the archive was skipped
        reason: String,
    },

    /// The archive was rejected or extraction failed
    Failed {
        /// Why the archive failed
        reason: String,
    },
}

/// Result of a delete attempt on a source archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteStatus {
    /// The archive file was removed
    Deleted,
    /// The archive file is still there
    Failed,
}

/// Details of a delete attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    /// Whether the archive was removed
    pub status: DeleteStatus,

    /// Human-readable, sanitized explanation
    pub message: String,

    /// Bytes released by the delete (0 on failure)
    pub freed_bytes: u64,
}

/// Record of one archive processed during a run. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Source archive path
    pub archive: PathBuf,

    /// What happened to it
    pub outcome: Outcome,

    /// Human-readable, sanitized summary
    pub message: String,

    /// Present when a delete was attempted after a successful extraction
    pub delete: Option<DeleteOutcome>,
}

impl ExtractionResult {
    /// Number of files written, zero unless the outcome is a success.
    pub fn files_count(&self) -> u64 {
        match self.outcome {
            Outcome::Success { files, .. } => files,
            _ => 0,
        }
    }

    /// Uncompressed bytes written, zero unless the outcome is a success.
    pub fn total_size(&self) -> u64 {
        match self.outcome {
            Outcome::Success { bytes, .. } => bytes,
            _ => 0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    /// `OK`, `SKIP` or `ERROR`, as written to the event log.
    pub fn status_label(&self) -> &'static str {
        match self.outcome {
            Outcome::Success { .. } => "OK",
            Outcome::Skipped { .. } => "SKIP",
            Outcome::Failed { .. } => "ERROR",
        }
    }
}

/// Whether an archive is known to be fully extracted on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    /// Archive that was checked
    pub archive: PathBuf,

    /// Every member of the archive is present under the sibling directory
    pub extracted: bool,

    /// Safe to delete the archive; always equal to `extracted`
    pub can_delete: bool,

    /// Human-readable, sanitized explanation
    pub message: String,

    /// Size of the archive file in bytes
    pub archive_size: u64,
}

/// Format a byte count for display.
///
/// # Examples
///
/// ```
/// use bulk_extractor::format_size;
///
/// assert_eq!(format_size(512), "512.0 B");
/// assert_eq!(format_size(1536), "1.5 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} TB")
}
