//! Error types for configuration, confinement, validation and extraction.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating the process configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue {
        /// Name of the offending variable
        var: &'static str,
        /// Raw value as found in the environment
        value: String,
    },

    /// A numeric limit is zero, negative or not finite.
    #[error("Limit {0} must be positive")]
    NonPositiveLimit(&'static str),

    /// Sandboxing is enabled but the sandbox root is unusable.
    #[error("Sandbox root does not exist or is not a directory: {0}")]
    MissingSandboxRoot(PathBuf),

    /// No sandbox root was configured and no home directory could be found.
    #[error("No sandbox root configured and no home directory available")]
    NoSandboxRoot,

    /// The log directory could not be made absolute.
    #[error("Cannot resolve log directory {path}: {source}")]
    LogDir {
        /// Directory as configured
        path: PathBuf,
        /// Underlying resolution failure
        #[source]
        source: io::Error,
    },
}

/// Errors raised when a path falls outside the allowed root.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The candidate could not be resolved to an absolute path.
    #[error("Cannot resolve path {path}: {source}")]
    Resolve {
        /// Candidate path as supplied by the caller
        path: PathBuf,
        /// Underlying resolution failure
        #[source]
        source: io::Error,
    },

    /// The resolved path is not equal to or nested under the root.
    #[error("Path must be under the allowed root {root}: {path}")]
    OutsideRoot {
        /// Resolved candidate path
        path: PathBuf,
        /// Configured sandbox root
        root: PathBuf,
    },
}

/// Archive-safety rejections. The first one hit aborts the whole archive.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// The container file itself is larger than allowed.
    #[error("Archive is too large: {size} bytes > {limit} bytes")]
    ContainerTooLarge {
        /// Size of the archive file in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },

    /// The archive declares more entries than allowed.
    #[error("Too many entries in archive: {count} > {limit}")]
    TooManyEntries {
        /// Number of entries in the central directory
        count: usize,
        /// Configured limit
        limit: usize,
    },

    /// The archive contains a symbolic link.
    #[error("Symlink entry not allowed: {0}")]
    Symlink(String),

    /// Absolute path not allowed in archive entries.
    #[error("Absolute path not allowed: {0}")]
    AbsolutePath(String),

    /// Path traversal attempt detected (e.g., "../../../etc/passwd").
    #[error("Path traversal attempt: {0}")]
    PathTraversal(String),

    /// The first path segment carries a drive separator (e.g., "C:evil").
    #[error("Drive prefix not allowed: {0}")]
    DrivePrefix(String),

    /// A single entry is larger than allowed.
    #[error("Entry too large: {name} ({size} bytes > {limit} bytes)")]
    EntryTooLarge {
        /// Entry name as stored in the archive
        name: String,
        /// Declared uncompressed size
        size: u64,
        /// Configured limit
        limit: u64,
    },

    /// Uncompressed/compressed ratio of an entry is too high.
    #[error("Suspicious compression ratio for {name}: {ratio:.1} > {limit}")]
    CompressionRatio {
        /// Entry name as stored in the archive
        name: String,
        /// Observed ratio
        ratio: f64,
        /// Configured limit
        limit: f64,
    },

    /// Sum of all declared uncompressed sizes is too high.
    #[error("Archive too large once extracted: {total} bytes > {limit} bytes")]
    TotalSizeExceeded {
        /// Aggregate uncompressed size
        total: u64,
        /// Configured limit
        limit: u64,
    },

    /// The destination filesystem cannot hold the extracted data.
    #[error("Not enough disk space: {required} bytes needed, {available} bytes free")]
    InsufficientSpace {
        /// Aggregate uncompressed size
        required: u64,
        /// Free bytes on the destination filesystem
        available: u64,
    },
}

/// Main error type for extraction operations.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Archive file not found at the specified path.
    #[error("Archive not found: {0}")]
    NotFound(PathBuf),

    /// A security violation was detected before extraction.
    #[error("Security violation: {0}")]
    Security(#[from] SecurityError),

    /// The archive is corrupted or malformed.
    #[error("Corrupted archive: {0}")]
    Corrupted(String),

    /// The archive uses a feature this engine cannot extract.
    #[error("Unsupported archive: {0}")]
    Unsupported(String),

    /// The process lacks permission for a filesystem operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// An I/O error occurred during extraction.
    #[error("System error: {0}")]
    Io(io::Error),

    /// Anything else, including a panic inside the extraction.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<io::Error> for ExtractError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => ExtractError::PermissionDenied(err.to_string()),
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
                ExtractError::Corrupted(err.to_string())
            }
            _ => ExtractError::Io(err),
        }
    }
}

impl From<zip::result::ZipError> for ExtractError {
    fn from(err: zip::result::ZipError) -> Self {
        use zip::result::ZipError;

        match err {
            ZipError::Io(io_err) => io_err.into(),
            ZipError::InvalidArchive(_) => ExtractError::Corrupted(err.to_string()),
            ZipError::UnsupportedArchive(_) => ExtractError::Unsupported(err.to_string()),
            other => ExtractError::Unexpected(other.to_string()),
        }
    }
}

/// Errors returned synchronously when an operation cannot be started.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The requested root does not exist.
    #[error("Directory does not exist: {0}")]
    RootNotFound(PathBuf),

    /// The requested root exists but is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The requested root is outside the sandbox.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// `create` was called outside a tokio runtime.
    #[error("No async runtime available to run the operation")]
    NoRuntime,
}
