//! # Bulk Extractor
//!
//! Finds ZIP archives under a directory and extracts each one into a
//! sibling directory named after it, safely and in the background.
//!
//! Every archive is checked before a single byte is written: entry count,
//! per-entry and total sizes, compression ratio, symlinks and unsafe member
//! paths are all rejected up front. Output is assembled in a hidden staging
//! directory and committed with one rename, so a destination is either
//! fully extracted or untouched.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bulk_extractor::{Config, ConflictPolicy, CreateRequest, OperationRegistry};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let registry = OperationRegistry::new(&config)?;
//!
//! let request = CreateRequest {
//!     policy: ConflictPolicy::Suffix,
//!     parallel: true,
//!     ..CreateRequest::new("/home/me/Downloads")
//! };
//! let id = registry.create(request)?;
//!
//! if let Some(snapshot) = registry.wait(&id).await {
//!     println!(
//!         "{}: {} extracted, {} failed",
//!         snapshot.status, snapshot.stats.success, snapshot.stats.failed
//!     );
//! }
//! # Ok(())
//! # }
//! ```

pub mod cleanup;
pub mod config;
pub mod discover;
pub mod error;
pub mod event_log;
pub mod extract;
pub mod operation;
pub mod probe;
pub mod registry;
pub mod safety;
pub mod sandbox;
pub mod sanitize;
pub mod types;
pub mod verify;

// Re-export main types
pub use cleanup::{cleanup, CleanupItem, CleanupReport, CleanupStats, CleanupStatus};
pub use config::Config;
pub use discover::ArchiveDiscovery;
pub use error::{ConfigError, ExtractError, RegistryError, SandboxError, SecurityError};
pub use event_log::EventLog;
pub use extract::ExtractionEngine;
pub use operation::{
    CreateRequest, Operation, OperationId, OperationSnapshot, OperationStats, OperationStatus,
};
pub use registry::OperationRegistry;
pub use safety::{ArchiveValidator, Limits};
pub use sandbox::PathSandbox;
pub use types::{
    format_size, ArchiveEntry, ArchiveInfo, ConflictPolicy, DeleteOutcome, DeleteStatus,
    ExtractionResult, Outcome, Verification,
};

use std::path::Path;

/// Probe an archive to retrieve metadata without extracting.
///
/// # Errors
///
/// Returns an error if the archive file doesn't exist or is not a readable ZIP.
pub fn probe(path: &Path) -> Result<ArchiveInfo, ExtractError> {
    probe::probe_archive(path)
}

/// Check whether an archive has been fully extracted into its sibling directory.
pub fn verify(archive_path: &Path) -> Verification {
    verify::verify_extraction(archive_path)
}
