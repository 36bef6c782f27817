mod common;

use bulk_extractor::{ConflictPolicy, EventLog, ExtractionEngine, Limits, Outcome};
use common::{create_failing_zip, create_sample_zip, create_zip, create_zip_with, leftover_staging, list_files};
use std::fs::{self, File};
use std::path::Path;
use tempfile::TempDir;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

fn engine() -> ExtractionEngine {
    ExtractionEngine::new(Limits::default())
}

fn failure_reason(outcome: &Outcome) -> &str {
    match outcome {
        Outcome::Failed { reason } => reason,
        other => panic!("Expected a failed outcome, got: {:?}", other),
    }
}

#[test]
fn test_extract_zip_basic() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("sample.zip");
    create_sample_zip(&archive_path).unwrap();

    let result = engine().extract(&archive_path, ConflictPolicy::Skip, None);

    // Verify extraction
    assert!(result.is_success(), "unexpected outcome: {:?}", result.outcome);
    assert_eq!(result.files_count(), 3);
    assert_eq!(result.total_size(), 300);
    assert_eq!(result.message, "OK (3 files)");
    assert!(result.delete.is_none());

    // Exactly the recorded files, at their recorded paths
    let destination = temp_dir.path().join("sample");
    assert_eq!(
        list_files(&destination),
        vec!["docs/guide.txt", "docs/img/logo.bin", "readme.txt"]
    );
    assert_eq!(fs::read(destination.join("readme.txt")).unwrap(), vec![b'r'; 100]);
    assert!(leftover_staging(temp_dir.path()).is_empty());
}

#[test]
fn test_extract_keeps_directory_entries() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("dirs.zip");

    let mut zip = ZipWriter::new(File::create(&archive_path).unwrap());
    zip.add_directory("empty/", SimpleFileOptions::default()).unwrap();
    zip.start_file("full/file.txt", SimpleFileOptions::default()).unwrap();
    std::io::Write::write_all(&mut zip, b"content").unwrap();
    zip.finish().unwrap();

    let result = engine().extract(&archive_path, ConflictPolicy::Skip, None);

    assert!(result.is_success());
    assert_eq!(result.files_count(), 1);
    assert!(temp_dir.path().join("dirs/empty").is_dir());
}

#[test]
fn test_compression_ratio_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("bomb.zip");
    let zeros = vec![0u8; 1024 * 1024];
    create_zip_with(&archive_path, &[("zeros.bin", zeros.as_slice())], CompressionMethod::Deflated).unwrap();

    let result = engine().extract(&archive_path, ConflictPolicy::Skip, None);

    assert!(failure_reason(&result.outcome).contains("Suspicious compression ratio"));
    assert!(!temp_dir.path().join("bomb").exists());
    assert!(leftover_staging(temp_dir.path()).is_empty());
}

#[test]
fn test_path_traversal_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let archive_dir = temp_dir.path().join("inbox");
    fs::create_dir(&archive_dir).unwrap();
    let archive_path = archive_dir.join("evil.zip");
    create_zip(&archive_path, &[("ok.txt", b"fine"), ("../escaped.txt", b"pwned")]).unwrap();

    let result = engine().extract(&archive_path, ConflictPolicy::Skip, None);

    assert!(failure_reason(&result.outcome).contains("Path traversal attempt"));
    assert!(!archive_dir.join("evil").exists());
    assert!(!archive_dir.join("escaped.txt").exists());
    assert!(!temp_dir.path().join("escaped.txt").exists());
}

#[test]
fn test_absolute_path_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("abs.zip");
    create_zip(&archive_path, &[("/tmp/absolute.txt", b"pwned")]).unwrap();

    let result = engine().extract(&archive_path, ConflictPolicy::Skip, None);

    assert!(failure_reason(&result.outcome).contains("Absolute path not allowed"));
    assert!(!temp_dir.path().join("abs").exists());
}

#[test]
fn test_symlink_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("links.zip");

    let mut zip = ZipWriter::new(File::create(&archive_path).unwrap());
    zip.start_file("regular.txt", SimpleFileOptions::default()).unwrap();
    std::io::Write::write_all(&mut zip, b"regular").unwrap();
    zip.add_symlink("passwd", "/etc/passwd", SimpleFileOptions::default())
        .unwrap();
    zip.finish().unwrap();

    let result = engine().extract(&archive_path, ConflictPolicy::Skip, None);

    assert!(failure_reason(&result.outcome).contains("Symlink entry not allowed"));
    assert!(!temp_dir.path().join("links").exists());
}

#[test]
fn test_entry_limits_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("sample.zip");
    create_sample_zip(&archive_path).unwrap();

    let too_many = ExtractionEngine::new(Limits {
        max_files: 2,
        ..Limits::default()
    });
    let result = too_many.extract(&archive_path, ConflictPolicy::Skip, None);
    assert!(failure_reason(&result.outcome).contains("Too many entries"));

    let too_large = ExtractionEngine::new(Limits {
        max_file_size: 100,
        ..Limits::default()
    });
    let result = too_large.extract(&archive_path, ConflictPolicy::Skip, None);
    assert!(failure_reason(&result.outcome).contains("Entry too large: docs/guide.txt"));

    let too_much = ExtractionEngine::new(Limits {
        max_total_size: 299,
        ..Limits::default()
    });
    let result = too_much.extract(&archive_path, ConflictPolicy::Skip, None);
    assert!(failure_reason(&result.outcome).contains("Archive too large once extracted"));

    let container = ExtractionEngine::new(Limits {
        max_zip_size: 10,
        ..Limits::default()
    });
    let result = container.extract(&archive_path, ConflictPolicy::Skip, None);
    assert!(failure_reason(&result.outcome).contains("Archive is too large"));

    assert!(!temp_dir.path().join("sample").exists());
}

#[test]
fn test_missing_and_corrupted_archives() {
    let temp_dir = TempDir::new().unwrap();

    let result = engine().extract(&temp_dir.path().join("missing.zip"), ConflictPolicy::Skip, None);
    assert!(failure_reason(&result.outcome).starts_with("Archive not found"));

    let garbage = temp_dir.path().join("garbage.zip");
    fs::write(&garbage, b"PK but not really").unwrap();
    let result = engine().extract(&garbage, ConflictPolicy::Skip, None);
    assert!(failure_reason(&result.outcome).starts_with("Corrupted archive"));
    assert!(!temp_dir.path().join("garbage").exists());
    assert!(leftover_staging(temp_dir.path()).is_empty());
}

#[test]
fn test_failure_on_last_entry_leaves_no_destination() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("broken.zip");
    create_failing_zip(&archive_path).unwrap();

    let result = engine().extract(&archive_path, ConflictPolicy::Skip, None);

    assert!(!result.is_success());
    assert_eq!(result.files_count(), 0);
    assert!(!temp_dir.path().join("broken").exists());
    assert!(leftover_staging(temp_dir.path()).is_empty());
}

#[test]
fn test_failure_on_last_entry_keeps_existing_destination() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("broken.zip");
    create_failing_zip(&archive_path).unwrap();

    let destination = temp_dir.path().join("broken");
    fs::create_dir(&destination).unwrap();
    fs::write(destination.join("keep.txt"), b"original").unwrap();

    let result = engine().extract(&archive_path, ConflictPolicy::Overwrite, None);

    assert!(!result.is_success());
    assert_eq!(list_files(&destination), vec!["keep.txt"]);
    assert_eq!(fs::read(destination.join("keep.txt")).unwrap(), b"original");
    assert!(leftover_staging(temp_dir.path()).is_empty());
}

fn existing_destination(root: &Path) -> std::path::PathBuf {
    let destination = root.join("sample");
    fs::create_dir(&destination).unwrap();
    fs::write(destination.join("stale.txt"), b"from an earlier run").unwrap();
    destination
}

#[test]
fn test_conflict_skip() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("sample.zip");
    create_sample_zip(&archive_path).unwrap();
    let destination = existing_destination(temp_dir.path());

    let result = engine().extract(&archive_path, ConflictPolicy::Skip, None);

    match &result.outcome {
        Outcome::Skipped { reason } => assert!(reason.starts_with("Destination already exists")),
        other => panic!("Expected Skipped, got: {:?}", other),
    }
    assert_eq!(result.status_label(), "SKIP");
    assert_eq!(list_files(&destination), vec!["stale.txt"]);
    assert_eq!(
        fs::read(destination.join("stale.txt")).unwrap(),
        b"from an earlier run"
    );
}

#[test]
fn test_conflict_suffix() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("sample.zip");
    create_sample_zip(&archive_path).unwrap();
    let destination = existing_destination(temp_dir.path());
    let suffixed = temp_dir.path().join("sample (1)");
    assert!(!suffixed.exists());

    let result = engine().extract(&archive_path, ConflictPolicy::Suffix, None);

    match &result.outcome {
        Outcome::Success { destination: dest, .. } => assert_eq!(dest, &suffixed),
        other => panic!("Expected Success, got: {:?}", other),
    }
    assert_eq!(list_files(&suffixed).len(), 3);
    assert_eq!(list_files(&destination), vec!["stale.txt"]);

    // A second run picks the next free name
    let result = engine().extract(&archive_path, ConflictPolicy::Suffix, None);
    assert!(result.is_success());
    assert!(temp_dir.path().join("sample (2)").is_dir());
}

#[test]
fn test_conflict_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("sample.zip");
    create_sample_zip(&archive_path).unwrap();
    let destination = existing_destination(temp_dir.path());

    let result = engine().extract(&archive_path, ConflictPolicy::Overwrite, None);

    assert!(result.is_success());
    assert_eq!(
        list_files(&destination),
        vec!["docs/guide.txt", "docs/img/logo.bin", "readme.txt"]
    );
    assert!(leftover_staging(temp_dir.path()).is_empty());
}

#[test]
fn test_event_log_lines() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("sample.zip");
    create_sample_zip(&archive_path).unwrap();
    let log = EventLog::new(temp_dir.path().join("logs/extract_test.log"));

    engine().extract(&archive_path, ConflictPolicy::Skip, Some(&log));
    engine().extract(&archive_path, ConflictPolicy::Skip, Some(&log));

    let content = fs::read_to_string(log.path()).unwrap();
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("] OK: "));
    assert!(lines[0].ends_with(" - OK (3 files)"));
    assert!(lines[1].contains("] SKIP: "));
}

#[test]
fn test_hostile_member_name_is_sanitized() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("inject.zip");
    let name = format!("../x\n[2020-01-01 00:00:00] OK: forged{}", "A".repeat(2000));
    create_zip(&archive_path, &[(name.as_str(), b"data")]).unwrap();
    let log = EventLog::new(temp_dir.path().join("inject.log"));

    let result = engine().extract(&archive_path, ConflictPolicy::Skip, Some(&log));

    let reason = failure_reason(&result.outcome);
    assert!(!reason.contains('\n'));
    assert!(reason.ends_with("... [truncated]"));

    let content = fs::read_to_string(log.path()).unwrap();
    assert_eq!(content.lines().count(), 1);
}
