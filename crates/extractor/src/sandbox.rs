//! Confinement of user-supplied paths to an allowed root.

use crate::config::Config;
use crate::error::{ConfigError, SandboxError};
use std::path::{Path, PathBuf};

/// Keeps every filesystem target under one root, unless disabled.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    /// Canonical root, `None` when confinement is disabled
    root: Option<PathBuf>,
}

impl PathSandbox {
    /// Confine to `root`, which must exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let root = root.as_ref();
        let canonical = root
            .canonicalize()
            .map_err(|_| ConfigError::MissingSandboxRoot(root.to_path_buf()))?;
        if !canonical.is_dir() {
            return Err(ConfigError::MissingSandboxRoot(root.to_path_buf()));
        }
        Ok(Self {
            root: Some(canonical),
        })
    }

    /// A sandbox that allows every path.
    pub fn disabled() -> Self {
        Self { root: None }
    }

    /// Build the sandbox described by the configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        if config.allow_any_path {
            return Ok(Self::disabled());
        }
        let root = config.base_dir.as_ref().ok_or(ConfigError::NoSandboxRoot)?;
        Self::new(root)
    }

    /// The canonical root, if confinement is enabled.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Resolve `candidate` and check it is the root or nested under it.
    ///
    /// Returns the absolute, symlink-resolved path on success. With
    /// confinement disabled the candidate is resolved when possible and
    /// always accepted.
    ///
    /// # Examples
    ///
    /// ```
    /// use bulk_extractor::PathSandbox;
    ///
    /// let root = tempfile::tempdir().unwrap();
    /// let sandbox = PathSandbox::new(root.path()).unwrap();
    /// assert!(sandbox.confine(root.path()).is_ok());
    /// assert!(sandbox.confine(root.path().join("..")).is_err());
    /// ```
    pub fn confine(&self, candidate: impl AsRef<Path>) -> Result<PathBuf, SandboxError> {
        let candidate = candidate.as_ref();

        let Some(root) = &self.root else {
            return Ok(candidate
                .canonicalize()
                .unwrap_or_else(|_| candidate.to_path_buf()));
        };

        let resolved = candidate
            .canonicalize()
            .map_err(|source| SandboxError::Resolve {
                path: candidate.to_path_buf(),
                source,
            })?;

        if resolved.starts_with(root) {
            Ok(resolved)
        } else {
            Err(SandboxError::OutsideRoot {
                path: resolved,
                root: root.clone(),
            })
        }
    }
}
