//! Verification of extracted archives and deletion of verified ones.

use crate::error::ExtractError;
use crate::event_log::EventLog;
use crate::extract::natural_destination;
use crate::probe::probe_archive;
use crate::safety::normalize_member_name;
use crate::sanitize::sanitize_message;
use crate::types::{DeleteOutcome, DeleteStatus, Verification};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Check that every file member of `archive_path` exists under its sibling directory.
///
/// Only the natural destination (`dir/name.zip` -> `dir/name`) is inspected,
/// so the answer is the same whether the archive was extracted by an earlier
/// run, by this run or by hand. `can_delete` is `true` exactly when
/// `extracted` is.
pub fn verify_extraction(archive_path: &Path) -> Verification {
    let mut verification = Verification {
        archive: archive_path.to_path_buf(),
        extracted: false,
        can_delete: false,
        message: String::new(),
        archive_size: 0,
    };

    match check(archive_path, &mut verification) {
        Ok(message) => verification.message = message,
        Err(ExtractError::Corrupted(_)) => verification.message = "Corrupted ZIP file".to_string(),
        Err(e) => verification.message = e.to_string(),
    }

    verification.can_delete = verification.extracted;
    verification.message = sanitize_message(&verification.message);
    debug!(
        archive = %archive_path.display(),
        extracted = verification.extracted,
        "{}",
        verification.message
    );
    verification
}

fn check(archive_path: &Path, verification: &mut Verification) -> Result<String, ExtractError> {
    let info = probe_archive(archive_path)?;
    verification.archive_size = info.compressed_bytes;

    let extract_dir = natural_destination(archive_path)?;
    // A symlinked destination could point anywhere; only a real directory counts
    let Ok(meta) = fs::symlink_metadata(&extract_dir) else {
        return Ok(format!(
            "Extracted directory does not exist: {}",
            extract_dir.display()
        ));
    };
    if !meta.is_dir() {
        return Ok(format!(
            "Destination is not a directory: {}",
            extract_dir.display()
        ));
    }

    let members: HashSet<String> = info
        .entries
        .iter()
        .filter(|e| !e.is_directory)
        .map(|e| normalize_member_name(&e.name))
        .collect();
    let on_disk = files_under(&extract_dir);

    let missing = members.iter().filter(|m| !on_disk.contains(*m)).count();
    if missing > 0 {
        return Ok(format!("Missing {missing} files"));
    }

    verification.extracted = true;
    Ok(format!("OK ({} files verified)", members.len()))
}

/// Relative, slash-separated paths of every regular file under `dir`.
fn files_under(dir: &Path) -> HashSet<String> {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let relative = e.path().strip_prefix(dir).ok()?;
            let parts: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            Some(parts.join("/"))
        })
        .collect()
}

/// Remove an archive file, reporting the bytes released.
pub fn delete_archive(archive_path: &Path) -> DeleteOutcome {
    let attempt = fs::metadata(archive_path)
        .map(|meta| meta.len())
        .and_then(|size| fs::remove_file(archive_path).map(|()| size));

    let outcome = match attempt {
        Ok(freed_bytes) => DeleteOutcome {
            status: DeleteStatus::Deleted,
            message: "Deleted".to_string(),
            freed_bytes,
        },
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => DeleteOutcome {
            status: DeleteStatus::Failed,
            message: "Insufficient permissions".to_string(),
            freed_bytes: 0,
        },
        Err(e) => DeleteOutcome {
            status: DeleteStatus::Failed,
            message: sanitize_message(&format!("Error: {e}")),
            freed_bytes: 0,
        },
    };

    info!(
        archive = %archive_path.display(),
        status = ?outcome.status,
        freed = outcome.freed_bytes,
        "{}",
        outcome.message
    );
    outcome
}

/// Delete `archive_path` only if its extraction verifies.
///
/// Writes a `DELETE OK` or `DELETE ERROR` line to `log` when given.
pub fn delete_if_verified(archive_path: &Path, log: Option<&EventLog>) -> DeleteOutcome {
    let verification = verify_extraction(archive_path);
    let outcome = if verification.can_delete {
        delete_archive(archive_path)
    } else {
        DeleteOutcome {
            status: DeleteStatus::Failed,
            message: sanitize_message(&format!("Not verified: {}", verification.message)),
            freed_bytes: 0,
        }
    };

    if let Some(log) = log {
        let label = match outcome.status {
            DeleteStatus::Deleted => "DELETE OK",
            DeleteStatus::Failed => "DELETE ERROR",
        };
        log.record(&format!(
            "{label}: {} - {}",
            archive_path.display(),
            outcome.message
        ));
    }
    outcome
}
