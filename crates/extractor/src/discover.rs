//! Discovery of ZIP archives under a root directory.

use crate::extract::STAGING_PREFIX;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// A restartable, finite listing of `.zip` files under a root.
///
/// Every call to [`ArchiveDiscovery::iter`] walks the tree again. Unreadable
/// directories are skipped with a warning instead of ending the walk, and
/// staging directories left by running extractions are never entered.
#[derive(Debug, Clone)]
pub struct ArchiveDiscovery {
    root: PathBuf,
    recursive: bool,
}

impl ArchiveDiscovery {
    pub fn new(root: impl Into<PathBuf>, recursive: bool) -> Self {
        Self {
            root: root.into(),
            recursive,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily yield archive paths in directory-walk order.
    pub fn iter(&self) -> impl Iterator<Item = PathBuf> + Send + 'static {
        let mut walker = WalkDir::new(&self.root).min_depth(1).follow_links(false);
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        walker
            .into_iter()
            .filter_entry(|entry| !is_staging_dir(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(path = ?e.path(), error = %e, "skipping unreadable path");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_zip_name(entry.path()))
            .map(DirEntry::into_path)
    }
}

/// Case-insensitive `.zip` extension check.
pub fn is_zip_name(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

fn is_staging_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(STAGING_PREFIX))
}
