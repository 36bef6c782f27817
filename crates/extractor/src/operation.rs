//! Shared state of one bulk run, and the snapshots handed to readers.

use crate::event_log::EventLog;
use crate::sanitize::sanitize_message;
use crate::types::{ConflictPolicy, DeleteStatus, ExtractionResult, Outcome};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Opaque identifier of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for OperationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle of an operation. `Done` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Running,
    Done,
    Error,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OperationStatus::Running)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationStatus::Running => "running",
            OperationStatus::Done => "done",
            OperationStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Aggregate counters of an operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStats {
    /// Archives processed so far
    pub found: u64,
    pub success: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Files written by successful extractions
    pub total_files: u64,
    /// Uncompressed bytes written by successful extractions
    pub total_size: u64,
    pub deleted: u64,
    pub delete_failed: u64,
    /// Archive bytes released by deletes
    pub freed_size: u64,
}

impl OperationStats {
    /// Fold one per-archive result into the counters.
    pub fn apply(&mut self, result: &ExtractionResult) {
        self.found += 1;
        match &result.outcome {
            Outcome::Success { files, bytes, .. } => {
                self.success += 1;
                self.total_files += files;
                self.total_size += bytes;
            }
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }

        if let Some(delete) = &result.delete {
            match delete.status {
                DeleteStatus::Deleted => {
                    self.deleted += 1;
                    self.freed_size += delete.freed_bytes;
                }
                DeleteStatus::Failed => self.delete_failed += 1,
            }
        }
    }
}

/// What a caller asks for when starting a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Directory to search for archives
    pub root: PathBuf,
    pub policy: ConflictPolicy,
    /// Descend into subdirectories
    pub recursive: bool,
    /// Use the worker pool; ignored when the pool has a single worker
    pub parallel: bool,
    /// Delete each archive once its extraction verifies
    pub delete_after: bool,
}

impl CreateRequest {
    /// Recursive, sequential run with the default policy and no deletes.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            policy: ConflictPolicy::default(),
            recursive: true,
            parallel: false,
            delete_after: false,
        }
    }
}

#[derive(Debug)]
struct OperationState {
    stats: OperationStats,
    results: Vec<ExtractionResult>,
    status: OperationStatus,
    message: Option<String>,
    total: Option<u64>,
    current: Option<PathBuf>,
    finished_at: Option<Instant>,
}

/// One bulk run, shared between its workers, its orchestrator and readers.
///
/// The settings never change after creation. Everything mutable sits behind
/// a single lock, and nothing changes any more once the status is terminal.
#[derive(Debug)]
pub struct Operation {
    id: OperationId,
    root: PathBuf,
    policy: ConflictPolicy,
    recursive: bool,
    parallel: bool,
    delete_after: bool,
    log: EventLog,
    created_at: DateTime<Utc>,
    state: Mutex<OperationState>,
}

impl Operation {
    /// A running operation over `root`, which must already be validated.
    pub fn new(id: OperationId, root: PathBuf, request: &CreateRequest, log: EventLog) -> Self {
        Self {
            id,
            root,
            policy: request.policy,
            recursive: request.recursive,
            parallel: request.parallel,
            delete_after: request.delete_after,
            log,
            created_at: Utc::now(),
            state: Mutex::new(OperationState {
                stats: OperationStats::default(),
                results: Vec::new(),
                status: OperationStatus::Running,
                message: None,
                total: None,
                current: None,
                finished_at: None,
            }),
        }
    }

    pub fn id(&self) -> &OperationId {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn delete_after(&self) -> bool {
        self.delete_after
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn status(&self) -> OperationStatus {
        self.state.lock().status
    }

    /// Note the archive being processed, for progress display.
    pub fn set_current(&self, archive: &Path) {
        let mut state = self.state.lock();
        if !state.status.is_terminal() {
            state.current = Some(archive.to_path_buf());
        }
    }

    /// Record how many archives the run will process.
    pub fn set_total(&self, total: u64) {
        let mut state = self.state.lock();
        if !state.status.is_terminal() {
            state.total = Some(total);
        }
    }

    /// Append a per-archive result and update the counters.
    pub fn record(&self, result: ExtractionResult) {
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            warn!(operation = %self.id, archive = %result.archive.display(), "result after terminal status dropped");
            return;
        }
        state.stats.apply(&result);
        state.results.push(result);
    }

    /// Move to `done`. The message reports what was processed.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            return;
        }

        let stats = state.stats;
        let message = if stats.found == 0 {
            format!("No ZIP archives found in {}", self.root.display())
        } else {
            format!(
                "Processed {} archives: {} extracted, {} skipped, {} failed",
                stats.found, stats.success, stats.skipped, stats.failed
            )
        };

        state.total.get_or_insert(stats.found);
        state.current = None;
        state.message = Some(message);
        state.status = OperationStatus::Done;
        state.finished_at = Some(Instant::now());
        info!(operation = %self.id, found = stats.found, "operation done");
    }

    /// Move to `error` because the run itself broke down.
    pub fn fail(&self, message: &str) {
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            return;
        }

        let message = sanitize_message(message);
        warn!(operation = %self.id, "operation failed: {message}");
        state.current = None;
        state.message = Some(message);
        state.status = OperationStatus::Error;
        state.finished_at = Some(Instant::now());
    }

    /// Whether the operation has been `done` for longer than `retention`.
    pub fn is_expired(&self, now: Instant, retention: Duration) -> bool {
        let state = self.state.lock();
        let expired = state.status == OperationStatus::Done
            && state
                .finished_at
                .is_some_and(|at| now.saturating_duration_since(at) > retention);
        if expired {
            debug!(operation = %self.id, "operation expired");
        }
        expired
    }

    /// Copy the current state under the lock.
    pub fn snapshot(&self) -> OperationSnapshot {
        let state = self.state.lock();
        OperationSnapshot {
            id: self.id.clone(),
            root: self.root.clone(),
            policy: self.policy,
            recursive: self.recursive,
            parallel: self.parallel,
            delete_after: self.delete_after,
            log_path: self.log.path().to_path_buf(),
            created_at: self.created_at,
            stats: state.stats,
            results: state.results.clone(),
            status: state.status,
            message: state.message.clone(),
            total: state.total,
            current: state.current.clone(),
        }
    }
}

/// Point-in-time copy of an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSnapshot {
    pub id: OperationId,
    pub root: PathBuf,
    pub policy: ConflictPolicy,
    pub recursive: bool,
    pub parallel: bool,
    pub delete_after: bool,
    pub log_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub stats: OperationStats,
    /// Per-archive results in the order they completed
    pub results: Vec<ExtractionResult>,
    pub status: OperationStatus,
    /// Terminal message, set once the operation stops running
    pub message: Option<String>,
    /// Number of archives, unknown while discovery is still running
    pub total: Option<u64>,
    /// Archive being processed (best effort)
    pub current: Option<PathBuf>,
}

impl OperationSnapshot {
    /// Completion in percent, `None` while the total is unknown.
    pub fn progress(&self) -> Option<f64> {
        let total = self.total?;
        if total == 0 {
            return Some(100.0);
        }
        Some((self.stats.found as f64 / total as f64 * 100.0).min(100.0))
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
