//! Archive probing functionality for reading metadata without extraction.

use crate::error::ExtractError;
use crate::types::{ArchiveEntry, ArchiveInfo};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

/// File-type bits of a unix mode.
const S_IFMT: u32 = 0o170000;
/// File-type value of a symbolic link.
const S_IFLNK: u32 = 0o120000;

/// Probe an archive to retrieve metadata without extracting.
///
/// # Errors
///
/// Returns an error if:
/// - The archive file doesn't exist
/// - The container is corrupted
/// - The archive cannot be read
pub fn probe_archive(path: &Path) -> Result<ArchiveInfo, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::NotFound(path.to_path_buf()));
    }

    let compressed_bytes = std::fs::metadata(path)?.len();
    let mut archive = zip::ZipArchive::new(BufReader::new(File::open(path)?))?;
    let entries = list_entries(&mut archive)?;
    let uncompressed_total = entries.iter().map(|e| e.size).sum();

    Ok(ArchiveInfo {
        compressed_bytes,
        uncompressed_total,
        entries,
    })
}

/// List every entry of an opened ZIP archive.
pub(crate) fn list_entries<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<Vec<ArchiveEntry>, ExtractError> {
    let mut entries = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        entries.push(ArchiveEntry {
            name: entry.name().to_string(),
            size: entry.size(),
            compressed_size: entry.compressed_size(),
            is_directory: entry.is_dir(),
            is_symlink: entry.unix_mode().is_some_and(is_symlink_mode),
        });
    }

    Ok(entries)
}

/// Whether a unix mode describes a symbolic link.
pub fn is_symlink_mode(mode: u32) -> bool {
    mode & S_IFMT == S_IFLNK
}
