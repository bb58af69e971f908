use dupesort::copier::{copy_file, CopyError, CopyOutcome, Copier};
use dupesort::scanner::{FileRecord, Hasher};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn hashed_record(path: &Path) -> FileRecord {
    let mut record = FileRecord::new(path.to_path_buf());
    record.digest = Some(Hasher::new().full_hash(path).unwrap());
    record
}

#[test]
fn test_copy_file_replaces_existing_destination() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src.txt");
    let dest = dir.path().join("dest.txt");
    fs::write(&src, "short").unwrap();
    fs::write(&dest, "a much longer previous content").unwrap();

    let bytes = copy_file(&src, &dest).unwrap();

    assert_eq!(bytes, 5);
    assert_eq!(fs::read_to_string(&dest).unwrap(), "short");
}

#[test]
fn test_copy_file_missing_source_leaves_no_destination() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("dest.txt");

    let err = copy_file(&dir.path().join("missing.txt"), &dest).unwrap_err();

    assert!(matches!(err, CopyError::OpenSource { .. }));
    assert!(!dest.exists());
}

#[test]
fn test_copier_dedups_across_buckets() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    let a = input.path().join("a.txt");
    let b = input.path().join("b.md");
    fs::write(&a, "same").unwrap();
    fs::write(&b, "same").unwrap();

    let mut copier = Copier::new(output.path());
    let first = copier.process(hashed_record(&a)).unwrap();
    let second = copier.process(hashed_record(&b)).unwrap();

    assert!(matches!(first, CopyOutcome::Copied { .. }));
    assert_eq!(second, CopyOutcome::Duplicate);
    assert!(!output.path().join("md").exists());
    assert_eq!(copier.stats().files_copied, 1);
    assert_eq!(copier.stats().duplicates_skipped, 1);
}

#[test]
fn test_copier_run_drains_queue() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    let (tx, rx) = crossbeam_channel::bounded(4);

    for (name, content) in [("a.txt", "1"), ("b.txt", "2"), ("c.txt", "1")] {
        let path = input.path().join(name);
        fs::write(&path, content).unwrap();
        tx.send(hashed_record(&path)).unwrap();
    }
    drop(tx);

    let stats = Copier::new(output.path()).run(&rx).unwrap();

    assert_eq!(stats.received, 3);
    assert_eq!(stats.files_copied, 2);
    assert_eq!(stats.duplicates_skipped, 1);
    assert_eq!(stats.buckets_created, 1);
}

#[test]
fn test_copier_run_stops_on_bucket_failure() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    let blocked = output.path().join("out");
    fs::write(&blocked, "regular file").unwrap();

    let path = input.path().join("a.txt");
    fs::write(&path, "x").unwrap();
    let (tx, rx) = crossbeam_channel::unbounded();
    tx.send(hashed_record(&path)).unwrap();
    drop(tx);

    let err = Copier::new(&blocked).run(&rx).unwrap_err();
    assert!(matches!(err, CopyError::CreateBucket { .. }));
    assert!(err.to_string().starts_with("Could not create directory"));
}
