use dupesort::copier::CopyError;
use dupesort::error::{ExitCode, StructuredError};
use dupesort::pipeline::{Pipeline, PipelineError};
use dupesort::policy::{policy_for, FailureSite, Policy, POLICY_TABLE};
use dupesort::scanner::ScanError;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_policy_table_matches_lookup() {
    for (site, policy) in POLICY_TABLE {
        assert_eq!(policy_for(site), policy, "mismatch for {site}");
    }
}

#[test]
fn test_only_path_resolution_and_bucket_creation_abort() {
    let fatal: Vec<_> = POLICY_TABLE
        .iter()
        .filter(|(_, policy)| *policy == Policy::Abort)
        .map(|(site, _)| *site)
        .collect();
    assert_eq!(
        fatal,
        vec![FailureSite::ResolvePath, FailureSite::CreateBucket]
    );
}

#[test]
fn test_bucket_failure_is_fatal_for_the_run() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    fs::write(input.path().join("a.txt"), "a").unwrap();
    fs::write(input.path().join("b.log"), "b").unwrap();
    // A regular file where the output root should be
    let blocked = output.path().join("out");
    fs::write(&blocked, "not a directory").unwrap();

    let pipeline = Pipeline::with_defaults();
    let err = pipeline.run(input.path(), &blocked).unwrap_err();

    match err {
        PipelineError::Copy(ref e @ CopyError::CreateBucket { .. }) => {
            assert!(e.site().is_fatal());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(pipeline.abort_handle().is_abort_requested());
}

#[test]
fn test_input_that_is_a_file_is_rejected() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("plain.txt");
    fs::write(&file, "x").unwrap();

    let err = Pipeline::with_defaults()
        .run(&file, &dir.path().join("out"))
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Scan(ScanError::NotADirectory(_))
    ));
}

#[test]
fn test_fatal_error_renders_as_structured_json() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    fs::write(input.path().join("a.txt"), "a").unwrap();
    let blocked = output.path().join("out");
    fs::write(&blocked, "not a directory").unwrap();

    let err = Pipeline::with_defaults()
        .run(input.path(), &blocked)
        .map_err(anyhow::Error::from)
        .unwrap_err()
        .context("Run aborted");

    let structured = StructuredError::new(&err, ExitCode::GeneralError);
    assert_eq!(structured.code, "DS001");
    assert_eq!(structured.exit_code, 1);
    assert!(structured.message.starts_with("Run aborted: Could not create directory"));
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_is_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    fs::write(input.path().join("visible.txt"), "visible").unwrap();
    let sub = input.path().join("no_access");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("hidden.txt"), "hidden").unwrap();
    fs::set_permissions(&sub, fs::Permissions::from_mode(0o000)).unwrap();

    let result = Pipeline::with_defaults().run(input.path(), output.path());

    // Restore permissions for cleanup
    fs::set_permissions(&sub, fs::Permissions::from_mode(0o755)).unwrap();

    let summary = result.unwrap();
    // Privileged runs can still read the directory
    assert!(summary.files_found == 1 || summary.files_found == 2);
    assert!(output.path().join("txt/visible.txt").is_file());
}
