//! Synchronous removal of archives whose extraction verifies.

use crate::discover::ArchiveDiscovery;
use crate::error::RegistryError;
use crate::event_log::EventLog;
use crate::operation::OperationId;
use crate::registry::resolve_root;
use crate::sandbox::PathSandbox;
use crate::types::{format_size, DeleteStatus};
use crate::verify::{delete_archive, verify_extraction};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// What happened to one archive during a cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupStatus {
    /// Verified and removed
    Deleted,
    /// Not verified, left in place
    Skipped,
    /// Verified but the delete failed
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupItem {
    pub archive: PathBuf,
    pub status: CleanupStatus,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupStats {
    pub found: u64,
    /// Archives whose extraction verified
    pub extracted: u64,
    pub deleted: u64,
    pub skipped: u64,
    pub failed: u64,
    pub freed_size: u64,
}

/// Outcome of a cleanup run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupReport {
    pub id: OperationId,
    pub root: PathBuf,
    /// Event log of the run, `None` when no archive was found
    pub log_path: Option<PathBuf>,
    pub stats: CleanupStats,
    pub items: Vec<CleanupItem>,
    /// Informational message for an empty run
    pub message: Option<String>,
}

/// Verify every archive under `root` and delete those fully extracted.
///
/// Archives that do not verify are skipped and stay on disk. A line per
/// archive goes to `<log_dir>/cleanup_<id>.log`.
///
/// # Errors
///
/// Returns an error if the root is missing, is not a directory or falls
/// outside the sandbox. Per-archive problems are reported in the items.
pub fn cleanup(
    root: &Path,
    recursive: bool,
    sandbox: &PathSandbox,
    log_dir: &Path,
) -> Result<CleanupReport, RegistryError> {
    let root = resolve_root(sandbox, root)?;
    let id = OperationId::new();

    let mut archives = ArchiveDiscovery::new(&root, recursive).iter().peekable();
    if archives.peek().is_none() {
        return Ok(CleanupReport {
            message: Some(format!("No ZIP archives found in {}", root.display())),
            id,
            root,
            log_path: None,
            stats: CleanupStats::default(),
            items: Vec::new(),
        });
    }

    let log = EventLog::new(log_dir.join(format!("cleanup_{id}.log")));
    log.record(&format!("Start cleanup in {}", root.display()));
    info!(operation = %id, root = %root.display(), "cleanup started");

    let mut stats = CleanupStats::default();
    let mut items = Vec::new();

    for archive in archives {
        stats.found += 1;
        let verification = verify_extraction(&archive);

        let item = if verification.can_delete {
            stats.extracted += 1;
            let outcome = delete_archive(&archive);
            match outcome.status {
                DeleteStatus::Deleted => {
                    stats.deleted += 1;
                    stats.freed_size += outcome.freed_bytes;
                    log.record(&format!("OK: {} - deleted", archive.display()));
                    CleanupItem {
                        status: CleanupStatus::Deleted,
                        message: format!("Deleted (freed {})", format_size(outcome.freed_bytes)),
                        archive,
                    }
                }
                DeleteStatus::Failed => {
                    stats.failed += 1;
                    log.record(&format!("ERROR: {} - {}", archive.display(), outcome.message));
                    CleanupItem {
                        status: CleanupStatus::Error,
                        message: format!("Delete failed: {}", outcome.message),
                        archive,
                    }
                }
            }
        } else {
            stats.skipped += 1;
            log.record(&format!("SKIP: {} - {}", archive.display(), verification.message));
            CleanupItem {
                status: CleanupStatus::Skipped,
                message: format!("Skipped: {}", verification.message),
                archive,
            }
        };
        items.push(item);
    }

    info!(
        operation = %id,
        found = stats.found,
        deleted = stats.deleted,
        freed = stats.freed_size,
        "cleanup finished"
    );

    Ok(CleanupReport {
        id,
        root,
        log_path: Some(log.path().to_path_buf()),
        stats,
        items,
        message: None,
    })
}
