//! Archive extraction with validation, staging and atomic commit.

use crate::error::ExtractError;
use crate::event_log::EventLog;
use crate::probe::list_entries;
use crate::safety::{ArchiveValidator, Limits, ValidatedArchive};
use crate::sanitize::sanitize_message;
use crate::types::{ConflictPolicy, ExtractionResult, Outcome};
use std::any::Any;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Name prefix of the hidden staging directories created next to destinations.
pub const STAGING_PREFIX: &str = ".extracting-";

/// What a successful call to the engine did.
#[derive(Debug)]
enum Extracted {
    Committed {
        files: u64,
        bytes: u64,
        destination: PathBuf,
    },
    Skipped(String),
}

/// Extracts ZIP archives into sibling directories.
///
/// Each archive is validated in full, written into a hidden staging
/// directory next to its destination and committed with a single rename.
/// A failure at any step leaves the destination untouched.
#[derive(Debug, Clone)]
pub struct ExtractionEngine {
    validator: ArchiveValidator,
}

impl ExtractionEngine {
    pub fn new(limits: Limits) -> Self {
        Self {
            validator: ArchiveValidator::new(limits),
        }
    }

    pub fn validator(&self) -> &ArchiveValidator {
        &self.validator
    }

    /// Extract `archive_path` next to itself and report what happened.
    ///
    /// Never fails: every error, including a panic inside the extraction,
    /// is folded into the returned result. When `log` is given one
    /// `OK`/`SKIP`/`ERROR` line is appended to it.
    pub fn extract(
        &self,
        archive_path: &Path,
        policy: ConflictPolicy,
        log: Option<&EventLog>,
    ) -> ExtractionResult {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.try_extract(archive_path, policy)
        }));

        let outcome = match attempt {
            Ok(Ok(Extracted::Committed {
                files,
                bytes,
                destination,
            })) => Outcome::Success {
                files,
                bytes,
                destination,
            },
            Ok(Ok(Extracted::Skipped(reason))) => Outcome::Skipped {
                reason: sanitize_message(&reason),
            },
            Ok(Err(e)) => Outcome::Failed {
                reason: sanitize_message(&e.to_string()),
            },
            Err(payload) => Outcome::Failed {
                reason: sanitize_message(
                    &ExtractError::Unexpected(panic_message(payload.as_ref())).to_string(),
                ),
            },
        };

        let message = match &outcome {
            Outcome::Success { files, .. } => format!("OK ({files} files)"),
            Outcome::Skipped { reason } | Outcome::Failed { reason } => reason.clone(),
        };

        let result = ExtractionResult {
            archive: archive_path.to_path_buf(),
            outcome,
            message,
            delete: None,
        };

        info!(
            archive = %archive_path.display(),
            status = result.status_label(),
            "{}",
            result.message
        );
        if let Some(log) = log {
            log.record(&format!(
                "{}: {} - {}",
                result.status_label(),
                archive_path.display(),
                result.message
            ));
        }

        result
    }

    fn try_extract(
        &self,
        archive_path: &Path,
        policy: ConflictPolicy,
    ) -> Result<Extracted, ExtractError> {
        let container_size = match fs::metadata(archive_path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ExtractError::NotFound(archive_path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        self.validator.check_container(container_size)?;

        let destination = natural_destination(archive_path)?;
        let Some(target) = resolve_target(&destination, policy)? else {
            return Ok(Extracted::Skipped(format!(
                "Destination already exists: {}",
                destination.display()
            )));
        };

        let staging = create_staging(&target)?;
        debug!(staging = %staging.path().display(), target = %target.display(), "staging created");

        let written = match self.fill_staging(archive_path, staging.path()) {
            Ok(written) => written,
            Err(e) => {
                discard_staging(staging);
                return Err(e);
            }
        };

        if let Err(e) = commit(staging.path(), &target, policy) {
            discard_staging(staging);
            return Err(e);
        }
        // The staging path no longer exists after the rename; dropping the guard is a no-op.
        drop(staging);

        Ok(Extracted::Committed {
            files: written.file_count,
            bytes: written.total_size,
            destination: target,
        })
    }

    /// Validate the archive and stream every entry into `staging`.
    fn fill_staging(
        &self,
        archive_path: &Path,
        staging: &Path,
    ) -> Result<ValidatedArchive, ExtractError> {
        let mut archive = zip::ZipArchive::new(BufReader::new(File::open(archive_path)?))?;
        let entries = list_entries(&mut archive)?;
        let mut validated = self.validator.validate(&entries)?;
        self.validator
            .check_free_space(validated.total_size, staging)?;

        let mut bytes_written = 0u64;
        for entry in &validated.entries {
            let output_path = staging.join(&entry.path);
            if entry.is_directory {
                fs::create_dir_all(&output_path)?;
                continue;
            }

            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            bytes_written += write_entry(&mut archive, entry.index, entry.size, &output_path)?;
        }

        validated.total_size = bytes_written;
        Ok(validated)
    }
}

/// Copy one entry, refusing to write more than its declared size.
fn write_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    index: usize,
    declared_size: u64,
    output_path: &Path,
) -> Result<u64, ExtractError> {
    let mut source = archive.by_index(index)?;
    let name = source.name().to_string();
    let mut output = File::create(output_path)?;

    let written = io::copy(&mut (&mut source).take(declared_size + 1), &mut output)?;
    if written > declared_size {
        return Err(ExtractError::Corrupted(format!(
            "Entry {name} is larger than its declared size"
        )));
    }

    Ok(written)
}

/// The sibling directory an archive extracts into: `dir/name.zip` -> `dir/name`.
pub fn natural_destination(archive_path: &Path) -> Result<PathBuf, ExtractError> {
    let parent = archive_path.parent().unwrap_or(Path::new(""));
    let stem = archive_path.file_stem().ok_or_else(|| {
        ExtractError::Unexpected(format!(
            "Cannot derive a destination from {}",
            archive_path.display()
        ))
    })?;
    Ok(parent.join(stem))
}

/// Apply the conflict policy to the natural destination.
///
/// Returns `None` when the archive must be skipped.
pub fn resolve_target(
    destination: &Path,
    policy: ConflictPolicy,
) -> Result<Option<PathBuf>, ExtractError> {
    if !path_exists(destination) {
        return Ok(Some(destination.to_path_buf()));
    }

    match policy {
        ConflictPolicy::Skip => Ok(None),
        ConflictPolicy::Overwrite => Ok(Some(destination.to_path_buf())),
        ConflictPolicy::Suffix => {
            let parent = destination.parent().unwrap_or(Path::new(""));
            let name = destination
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            (1u64..)
                .map(|i| parent.join(format!("{name} ({i})")))
                .find(|candidate| !path_exists(candidate))
                .map(Some)
                .ok_or_else(|| {
                    ExtractError::Io(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        "Could not find unique directory name",
                    ))
                })
        }
    }
}

/// Existence check that also sees dangling symlinks.
fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Hidden staging directory on the same filesystem as `target`.
fn create_staging(target: &Path) -> Result<TempDir, ExtractError> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let staging = tempfile::Builder::new()
        .prefix(&format!("{STAGING_PREFIX}{name}-"))
        .tempdir_in(parent)?;
    Ok(staging)
}

/// Replace the destination if asked to, then rename staging onto it.
fn commit(staging: &Path, target: &Path, policy: ConflictPolicy) -> Result<(), ExtractError> {
    if policy == ConflictPolicy::Overwrite {
        if let Ok(meta) = fs::symlink_metadata(target) {
            if meta.is_dir() {
                fs::remove_dir_all(target)?;
            } else {
                fs::remove_file(target)?;
            }
            debug!(target = %target.display(), "previous destination removed");
        }
    }

    fs::rename(staging, target)?;
    Ok(())
}

fn discard_staging(staging: TempDir) {
    let path = staging.path().to_path_buf();
    if let Err(e) = staging.close() {
        warn!(staging = %path.display(), error = %e, "failed to remove staging directory");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic during extraction".to_string()
    }
}
