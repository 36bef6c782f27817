//! Fixture helpers shared by the integration tests.
#![allow(dead_code)]

use bulk_extractor::Config;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

/// Write a ZIP whose entries are stored uncompressed.
pub fn create_zip(path: &Path, entries: &[(&str, &[u8])]) -> zip::result::ZipResult<()> {
    create_zip_with(path, entries, CompressionMethod::Stored)
}

pub fn create_zip_with(
    path: &Path,
    entries: &[(&str, &[u8])],
    method: CompressionMethod,
) -> zip::result::ZipResult<()> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(method);

    for (name, content) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(content)?;
    }

    zip.finish()?;
    Ok(())
}

/// Three files, 300 bytes in total, two of them nested.
pub fn create_sample_zip(path: &Path) -> zip::result::ZipResult<()> {
    create_zip(
        path,
        &[
            ("readme.txt", &[b'r'; 100]),
            ("docs/guide.txt", &[b'g'; 120]),
            ("docs/img/logo.bin", &[7u8; 80]),
        ],
    )
}

/// A ZIP that passes validation but fails while writing its last entry:
/// `a/b.txt` is a file, so `a/b.txt/c.txt` cannot be created.
pub fn create_failing_zip(path: &Path) -> zip::result::ZipResult<()> {
    create_zip(
        path,
        &[
            ("first.txt", b"first"),
            ("a/b.txt", b"file"),
            ("a/b.txt/c.txt", b"cannot land"),
        ],
    )
}

/// Sorted relative paths of every file under `dir`.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

/// Names of hidden staging directories left in `dir`.
pub fn leftover_staging(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(bulk_extractor::extract::STAGING_PREFIX))
        })
        .collect()
}

/// Configuration confined to `root`, logging under `root/logs`.
pub fn test_config(root: &Path, max_workers: usize) -> Config {
    Config {
        base_dir: Some(root.to_path_buf()),
        allow_any_path: false,
        log_dir: root.join("logs"),
        max_workers,
        ..Config::default()
    }
}
