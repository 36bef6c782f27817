mod common;

use bulk_extractor::verify::delete_if_verified;
use bulk_extractor::{
    cleanup, verify, CleanupStatus, ConflictPolicy, DeleteStatus, ExtractionEngine, Limits,
    PathSandbox, RegistryError,
};
use common::{create_sample_zip, create_zip};
use std::fs;
use tempfile::TempDir;

fn extract(archive: &std::path::Path) {
    let result = ExtractionEngine::new(Limits::default()).extract(archive, ConflictPolicy::Skip, None);
    assert!(result.is_success(), "extraction failed: {:?}", result.outcome);
}

#[test]
fn test_verify_after_extraction_is_stable() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("sample.zip");
    create_sample_zip(&archive_path).unwrap();
    extract(&archive_path);

    let first = verify(&archive_path);
    let second = verify(&archive_path);

    assert!(first.extracted);
    assert!(first.can_delete);
    assert_eq!(first.message, "OK (3 files verified)");
    assert_eq!(first.archive_size, fs::metadata(&archive_path).unwrap().len());
    assert_eq!(second.extracted, first.extracted);
    assert_eq!(second.message, first.message);
}

#[test]
fn test_verify_accepts_manual_extraction() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("manual.zip");
    create_zip(&archive_path, &[("a.txt", b"a"), ("nested\\b.txt", b"b")]).unwrap();

    // Extracted by hand, with an extra file the archive does not know about
    let destination = temp_dir.path().join("manual");
    fs::create_dir_all(destination.join("nested")).unwrap();
    fs::write(destination.join("a.txt"), b"a").unwrap();
    fs::write(destination.join("nested/b.txt"), b"b").unwrap();
    fs::write(destination.join("extra.txt"), b"extra").unwrap();

    let verification = verify(&archive_path);
    assert!(verification.extracted);
    assert!(verification.can_delete);
}

#[test]
fn test_verify_missing_files() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("sample.zip");
    create_sample_zip(&archive_path).unwrap();
    extract(&archive_path);
    fs::remove_file(temp_dir.path().join("sample/docs/guide.txt")).unwrap();

    let verification = verify(&archive_path);

    assert!(!verification.extracted);
    assert!(!verification.can_delete);
    assert_eq!(verification.message, "Missing 1 files");
}

#[test]
fn test_verify_without_destination() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("sample.zip");
    create_sample_zip(&archive_path).unwrap();

    let verification = verify(&archive_path);
    assert!(!verification.extracted);
    assert!(verification.message.starts_with("Extracted directory does not exist"));

    // A plain file where the directory should be
    fs::write(temp_dir.path().join("sample"), b"not a directory").unwrap();
    let verification = verify(&archive_path);
    assert!(!verification.can_delete);
    assert!(verification.message.starts_with("Destination is not a directory"));
}

#[cfg(unix)]
#[test]
fn test_verify_rejects_symlinked_destination() {
    let temp_dir = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("sample.zip");
    create_sample_zip(&archive_path).unwrap();

    // A complete copy of the contents elsewhere, linked in as the destination
    let elsewhere = outside.path().join("sample.zip");
    fs::copy(&archive_path, &elsewhere).unwrap();
    extract(&elsewhere);
    std::os::unix::fs::symlink(outside.path().join("sample"), temp_dir.path().join("sample"))
        .unwrap();

    let verification = verify(&archive_path);
    assert!(!verification.extracted);
    assert!(!verification.can_delete);
    assert!(verification.message.starts_with("Destination is not a directory"));

    let outcome = delete_if_verified(&archive_path, None);
    assert_eq!(outcome.status, DeleteStatus::Failed);
    assert!(archive_path.exists());
}

#[test]
fn test_verify_corrupted_archive() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("broken.zip");
    fs::write(&archive_path, b"definitely not a zip archive").unwrap();
    fs::create_dir(temp_dir.path().join("broken")).unwrap();

    let verification = verify(&archive_path);
    assert!(!verification.extracted);
    assert_eq!(verification.message, "Corrupted ZIP file");
}

#[test]
fn test_delete_if_verified() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("sample.zip");
    create_sample_zip(&archive_path).unwrap();
    let size = fs::metadata(&archive_path).unwrap().len();

    // Not extracted yet: refused
    let outcome = delete_if_verified(&archive_path, None);
    assert_eq!(outcome.status, DeleteStatus::Failed);
    assert!(outcome.message.starts_with("Not verified"));
    assert!(archive_path.exists());

    extract(&archive_path);
    let outcome = delete_if_verified(&archive_path, None);
    assert_eq!(outcome.status, DeleteStatus::Deleted);
    assert_eq!(outcome.freed_bytes, size);
    assert!(!archive_path.exists());
}

#[test]
fn test_cleanup_deletes_only_verified_archives() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("downloads");
    fs::create_dir_all(root.join("sub")).unwrap();

    let done = root.join("done.zip");
    create_sample_zip(&done).unwrap();
    extract(&done);
    let pending = root.join("sub/pending.zip");
    create_sample_zip(&pending).unwrap();
    let done_size = fs::metadata(&done).unwrap().len();

    let sandbox = PathSandbox::new(temp_dir.path()).unwrap();
    let log_dir = temp_dir.path().join("logs");
    let report = cleanup(&root, true, &sandbox, &log_dir).unwrap();

    assert_eq!(report.stats.found, 2);
    assert_eq!(report.stats.extracted, 1);
    assert_eq!(report.stats.deleted, 1);
    assert_eq!(report.stats.skipped, 1);
    assert_eq!(report.stats.failed, 0);
    assert_eq!(report.stats.freed_size, done_size);
    assert!(!done.exists());
    assert!(pending.exists());

    let skipped = report
        .items
        .iter()
        .find(|item| item.status == CleanupStatus::Skipped)
        .unwrap();
    assert!(skipped.message.starts_with("Skipped: Extracted directory does not exist"));

    let log_path = report.log_path.unwrap();
    assert!(log_path.starts_with(&log_dir));
    let content = fs::read_to_string(log_path).unwrap();
    assert_eq!(content.lines().count(), 3);
    assert!(content.contains("OK: "));
    assert!(content.contains("SKIP: "));
}

#[test]
fn test_cleanup_empty_root() {
    let temp_dir = TempDir::new().unwrap();
    let sandbox = PathSandbox::new(temp_dir.path()).unwrap();

    let report = cleanup(temp_dir.path(), true, &sandbox, &temp_dir.path().join("logs")).unwrap();

    assert_eq!(report.stats.found, 0);
    assert!(report.items.is_empty());
    assert!(report.log_path.is_none());
    assert!(report.message.unwrap().starts_with("No ZIP archives found"));
}

#[test]
fn test_cleanup_rejects_root_outside_sandbox() {
    let sandbox_dir = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let sandbox = PathSandbox::new(sandbox_dir.path()).unwrap();

    let result = cleanup(outside.path(), true, &sandbox, sandbox_dir.path());
    match result.unwrap_err() {
        RegistryError::Sandbox(_) => {}
        e => panic!("Expected Sandbox error, got: {:?}", e),
    }
}
