//! Security and safety checks for archive extraction.
//!
//! Every archive is inspected in full before a single byte is written:
//! entry count, symlinks, entry names (zip-slip), per-entry size,
//! compression ratio and aggregate size, then free space on the target
//! filesystem. The first violation rejects the whole archive.

use crate::config::Config;
use crate::error::SecurityError;
use crate::types::ArchiveEntry;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Limits applied by [`ArchiveValidator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub max_files: usize,
    pub max_file_size: u64,
    pub max_total_size: u64,
    pub max_compression_ratio: f64,
    pub max_zip_size: u64,
}

impl From<&Config> for Limits {
    fn from(config: &Config) -> Self {
        Self {
            max_files: config.max_files,
            max_file_size: config.max_file_size,
            max_total_size: config.max_total_size,
            max_compression_ratio: config.max_compression_ratio,
            max_zip_size: config.max_zip_size,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// An entry that passed validation, with its safe relative path.
#[derive(Debug, Clone)]
pub struct ValidatedEntry {
    /// Position of the entry in the archive
    pub index: usize,
    /// Normalized path relative to the destination
    pub path: PathBuf,
    pub is_directory: bool,
    pub size: u64,
}

/// Outcome of a successful validation pass.
#[derive(Debug, Clone)]
pub struct ValidatedArchive {
    pub entries: Vec<ValidatedEntry>,
    /// Number of non-directory entries
    pub file_count: u64,
    /// Sum of declared uncompressed sizes
    pub total_size: u64,
}

/// Accepts or rejects archives from their metadata alone.
#[derive(Debug, Clone)]
pub struct ArchiveValidator {
    limits: Limits,
}

impl ArchiveValidator {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Reject containers larger than the configured maximum, before opening them.
    pub fn check_container(&self, size: u64) -> Result<(), SecurityError> {
        if size > self.limits.max_zip_size {
            return Err(SecurityError::ContainerTooLarge {
                size,
                limit: self.limits.max_zip_size,
            });
        }
        Ok(())
    }

    /// Run the metadata checks over every entry, in order, first failure wins.
    pub fn validate(&self, entries: &[ArchiveEntry]) -> Result<ValidatedArchive, SecurityError> {
        if entries.len() > self.limits.max_files {
            return Err(SecurityError::TooManyEntries {
                count: entries.len(),
                limit: self.limits.max_files,
            });
        }

        let mut validated = Vec::with_capacity(entries.len());
        let mut total_size = 0u64;
        let mut file_count = 0u64;

        for (index, entry) in entries.iter().enumerate() {
            if entry.is_symlink {
                return Err(SecurityError::Symlink(entry.name.clone()));
            }

            let path = validate_entry_path(&entry.name)?;

            if entry.size > self.limits.max_file_size {
                return Err(SecurityError::EntryTooLarge {
                    name: entry.name.clone(),
                    size: entry.size,
                    limit: self.limits.max_file_size,
                });
            }

            let ratio = compression_ratio(entry.size, entry.compressed_size);
            if ratio > self.limits.max_compression_ratio {
                return Err(SecurityError::CompressionRatio {
                    name: entry.name.clone(),
                    ratio,
                    limit: self.limits.max_compression_ratio,
                });
            }

            if !entry.is_directory {
                total_size = total_size.saturating_add(entry.size);
                file_count += 1;
            }

            validated.push(ValidatedEntry {
                index,
                path,
                is_directory: entry.is_directory,
                size: entry.size,
            });
        }

        if total_size > self.limits.max_total_size {
            return Err(SecurityError::TotalSizeExceeded {
                total: total_size,
                limit: self.limits.max_total_size,
            });
        }

        debug!(entries = entries.len(), file_count, total_size, "archive metadata accepted");

        Ok(ValidatedArchive {
            entries: validated,
            file_count,
            total_size,
        })
    }

    /// Check the filesystem holding `target_dir` can take `required` bytes.
    ///
    /// When the filesystem cannot be identified the check passes; the write
    /// itself will then surface any out-of-space error.
    pub fn check_free_space(&self, required: u64, target_dir: &Path) -> Result<(), SecurityError> {
        match fs2::available_space(target_dir) {
            Ok(available) if required > available => {
                Err(SecurityError::InsufficientSpace { required, available })
            }
            Ok(_) => Ok(()),
            Err(e) => {
                debug!(target = %target_dir.display(), error = %e, "free space unknown for target filesystem");
                Ok(())
            }
        }
    }
}

/// Uncompressed/compressed ratio, with the compressed size floored at one byte.
pub fn compression_ratio(size: u64, compressed_size: u64) -> f64 {
    size as f64 / compressed_size.max(1) as f64
}

/// Normalize an archive member name to a POSIX-style relative string.
///
/// Backslashes become slashes; empty and `.` segments are dropped. No
/// safety check is made here, see [`validate_entry_path`].
pub fn normalize_member_name(name: &str) -> String {
    name.replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Validates and normalizes an archive entry name to prevent path traversal.
///
/// This function performs the following checks on the name with separators
/// normalized to `/`:
/// - Rejects absolute paths
/// - Rejects names containing a `..` segment
/// - Rejects a first segment carrying a drive separator (`C:...`)
/// - Rejects names that normalize to nothing
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use bulk_extractor::safety::validate_entry_path;
///
/// // Valid relative path
/// let safe_path = validate_entry_path("dir\\file.txt").unwrap();
/// assert_eq!(safe_path, Path::new("dir/file.txt"));
///
/// // Path traversal attempt - rejected
/// assert!(validate_entry_path("../../etc/passwd").is_err());
///
/// // Absolute path - rejected
/// assert!(validate_entry_path("/etc/passwd").is_err());
/// ```
pub fn validate_entry_path(name: &str) -> Result<PathBuf, SecurityError> {
    let unified = name.replace('\\', "/");

    if unified.starts_with('/') {
        return Err(SecurityError::AbsolutePath(name.to_string()));
    }

    let parts: Vec<&str> = unified
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();

    if parts.iter().any(|part| *part == "..") {
        return Err(SecurityError::PathTraversal(name.to_string()));
    }

    if parts.first().is_some_and(|first| first.contains(':')) {
        return Err(SecurityError::DrivePrefix(name.to_string()));
    }

    if parts.is_empty() {
        return Err(SecurityError::PathTraversal(format!(
            "Path normalizes to empty: {name:?}"
        )));
    }

    Ok(parts.iter().collect())
}
