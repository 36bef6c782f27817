//! Registry of background extraction runs.

use crate::config::{absolute_dir, Config};
use crate::discover::ArchiveDiscovery;
use crate::error::{ConfigError, ExtractError, RegistryError};
use crate::event_log::EventLog;
use crate::extract::ExtractionEngine;
use crate::operation::{CreateRequest, Operation, OperationId, OperationSnapshot};
use crate::safety::Limits;
use crate::sandbox::PathSandbox;
use crate::types::ExtractionResult;
use crate::verify::delete_if_verified;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info};

/// How long a `done` operation stays readable.
pub const RETENTION: Duration = Duration::from_secs(60 * 60);

/// Minimum time between two eviction sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const WAIT_POLL: Duration = Duration::from_millis(50);

struct OperationEntry {
    operation: Arc<Operation>,
    /// Kept so the task is owned by the registry; never awaited.
    _task: JoinHandle<()>,
}

/// Owns every operation started in this process.
///
/// Share it behind an `Arc`. `create` needs to be called from inside a
/// tokio runtime; the run itself happens on the runtime's blocking pool.
pub struct OperationRegistry {
    engine: Arc<ExtractionEngine>,
    sandbox: PathSandbox,
    log_dir: PathBuf,
    max_workers: usize,
    retention: Duration,
    sweep_interval: Duration,
    operations: Mutex<HashMap<OperationId, OperationEntry>>,
    last_sweep: Mutex<Instant>,
}

impl OperationRegistry {
    /// Build a registry from a validated configuration.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Self::with_retention(config, RETENTION, SWEEP_INTERVAL)
    }

    /// Like [`OperationRegistry::new`] with custom eviction timings, mainly for tests.
    pub fn with_retention(
        config: &Config,
        retention: Duration,
        sweep_interval: Duration,
    ) -> Result<Self, ConfigError> {
        let log_dir = absolute_dir(&config.log_dir).map_err(|source| ConfigError::LogDir {
            path: config.log_dir.clone(),
            source,
        })?;
        Ok(Self {
            engine: Arc::new(ExtractionEngine::new(Limits::from(config))),
            sandbox: PathSandbox::from_config(config)?,
            log_dir,
            max_workers: config.max_workers.max(1),
            retention,
            sweep_interval,
            operations: Mutex::new(HashMap::new()),
            last_sweep: Mutex::new(Instant::now()),
        })
    }

    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Validate the root, register a new operation and start it in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is missing, is not a directory, falls
    /// outside the sandbox, or no tokio runtime is running.
    pub fn create(&self, request: CreateRequest) -> Result<OperationId, RegistryError> {
        self.maybe_sweep();

        let runtime = Handle::try_current().map_err(|_| RegistryError::NoRuntime)?;
        let root = resolve_root(&self.sandbox, &request.root)?;

        let id = OperationId::new();
        let log = EventLog::new(self.log_dir.join(format!("extract_{id}.log")));
        let operation = Arc::new(Operation::new(id.clone(), root, &request, log));

        let task = runtime.spawn(run_operation(
            Arc::clone(&self.engine),
            self.max_workers,
            Arc::clone(&operation),
        ));

        info!(operation = %id, root = %operation.root().display(), "operation created");
        self.operations.lock().insert(
            id.clone(),
            OperationEntry {
                operation,
                _task: task,
            },
        );
        Ok(id)
    }

    /// Snapshot of an operation, `None` if unknown or evicted.
    pub fn get(&self, id: &OperationId) -> Option<OperationSnapshot> {
        self.maybe_sweep();
        let operation = self.operation(id)?;
        Some(operation.snapshot())
    }

    /// Poll an operation until it reaches a terminal status.
    pub async fn wait(&self, id: &OperationId) -> Option<OperationSnapshot> {
        let operation = self.operation(id)?;
        loop {
            let snapshot = operation.snapshot();
            if snapshot.is_terminal() {
                return Some(snapshot);
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    /// Number of tracked operations.
    pub fn len(&self) -> usize {
        self.maybe_sweep();
        self.operations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn operation(&self, id: &OperationId) -> Option<Arc<Operation>> {
        self.operations
            .lock()
            .get(id)
            .map(|entry| Arc::clone(&entry.operation))
    }

    /// Evict expired operations, at most once per sweep interval.
    fn maybe_sweep(&self) {
        let now = Instant::now();
        {
            let mut last_sweep = self.last_sweep.lock();
            if now.saturating_duration_since(*last_sweep) < self.sweep_interval {
                return;
            }
            *last_sweep = now;
        }

        let mut operations = self.operations.lock();
        let before = operations.len();
        operations.retain(|_, entry| !entry.operation.is_expired(now, self.retention));
        let evicted = before - operations.len();
        if evicted > 0 {
            debug!(evicted, remaining = operations.len(), "evicted finished operations");
        }
    }
}

/// Check that `root` exists, is a directory and lies inside the sandbox.
///
/// Returns the resolved root.
pub fn resolve_root(sandbox: &PathSandbox, root: &Path) -> Result<PathBuf, RegistryError> {
    match fs::metadata(root) {
        Err(_) => return Err(RegistryError::RootNotFound(root.to_path_buf())),
        Ok(meta) if !meta.is_dir() => {
            return Err(RegistryError::NotADirectory(root.to_path_buf()))
        }
        Ok(_) => {}
    }
    Ok(sandbox.confine(root)?)
}

async fn run_operation(engine: Arc<ExtractionEngine>, max_workers: usize, operation: Arc<Operation>) {
    info!(
        operation = %operation.id(),
        parallel = operation.parallel(),
        recursive = operation.recursive(),
        "operation started"
    );

    let discovery = ArchiveDiscovery::new(operation.root(), operation.recursive());
    let outcome = if operation.parallel() && max_workers > 1 {
        run_parallel(engine, max_workers, Arc::clone(&operation), discovery).await
    } else {
        run_sequential(engine, Arc::clone(&operation), discovery).await
    };

    match outcome {
        Ok(()) => operation.finish(),
        Err(e) => operation.fail(&e.to_string()),
    }
}

/// Process archives one at a time, in discovery order.
async fn run_sequential(
    engine: Arc<ExtractionEngine>,
    operation: Arc<Operation>,
    discovery: ArchiveDiscovery,
) -> Result<(), ExtractError> {
    tokio::task::spawn_blocking(move || {
        log_start(&operation);
        for archive in discovery.iter() {
            let result = process_archive(&engine, &operation, &archive);
            operation.record(result);
        }
    })
    .await
    .map_err(|e| ExtractError::Unexpected(format!("extraction task failed: {e}")))
}

/// Materialize the discovery, then fan out to at most `max_workers` blocking workers.
async fn run_parallel(
    engine: Arc<ExtractionEngine>,
    max_workers: usize,
    operation: Arc<Operation>,
    discovery: ArchiveDiscovery,
) -> Result<(), ExtractError> {
    let starting = Arc::clone(&operation);
    let archives: Vec<PathBuf> = tokio::task::spawn_blocking(move || {
        log_start(&starting);
        discovery.iter().collect()
    })
    .await
    .map_err(|e| ExtractError::Unexpected(format!("archive discovery failed: {e}")))?;
    operation.set_total(archives.len() as u64);
    debug!(operation = %operation.id(), total = archives.len(), "archives discovered");

    let mut tasks = JoinSet::new();
    let semaphore = Arc::new(Semaphore::new(max_workers));

    for archive in archives {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| ExtractError::Unexpected(format!("worker pool closed: {e}")))?;
        let engine = Arc::clone(&engine);
        let operation = Arc::clone(&operation);

        tasks.spawn_blocking(move || {
            let _permit = permit;
            let result = process_archive(&engine, &operation, &archive);
            operation.record(result);
        });
    }

    while let Some(joined) = tasks.join_next().await {
        joined.map_err(|e| ExtractError::Unexpected(format!("extraction worker failed: {e}")))?;
    }
    Ok(())
}

/// First event log line of a run. Blocking file I/O, keep off the async workers.
fn log_start(operation: &Operation) {
    operation
        .log()
        .record(&format!("Start extraction in {}", operation.root().display()));
}

/// Extract one archive and, when asked, delete it once verified.
fn process_archive(
    engine: &ExtractionEngine,
    operation: &Operation,
    archive: &Path,
) -> ExtractionResult {
    operation.set_current(archive);

    let mut result = engine.extract(archive, operation.policy(), Some(operation.log()));
    if operation.delete_after() && result.is_success() {
        result.delete = Some(delete_if_verified(archive, Some(operation.log())));
    }
    result
}
