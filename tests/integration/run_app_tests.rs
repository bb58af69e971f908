use clap::Parser;
use dupesort::cli::Cli;
use dupesort::error::ExitCode;
use std::fs;
use tempfile::tempdir;

fn parse(args: &[&str]) -> Cli {
    let mut full = vec!["dupesort"];
    full.extend_from_slice(args);
    Cli::try_parse_from(full).unwrap()
}

#[test]
fn test_missing_flags_is_a_no_op() {
    let result = dupesort::run_app(parse(&["-q"])).unwrap();
    assert_eq!(result, ExitCode::Success);
}

#[test]
fn test_missing_out_does_no_work() {
    let input = tempdir().unwrap();
    fs::write(input.path().join("a.txt"), "a").unwrap();

    let result = dupesort::run_app(parse(&["-q", "--in", input.path().to_str().unwrap()])).unwrap();

    assert_eq!(result, ExitCode::Success);
    assert_eq!(fs::read_dir(input.path()).unwrap().count(), 1);
}

#[test]
fn test_nonexistent_input_does_no_work() {
    let output = tempdir().unwrap();
    let out_root = output.path().join("out");

    let result = dupesort::run_app(parse(&[
        "-q",
        "--in",
        "/non/existent/path/that/really/should/not/exist",
        "--out",
        out_root.to_str().unwrap(),
    ]))
    .unwrap();

    assert_eq!(result, ExitCode::Success);
    assert!(!out_root.exists());
}

#[test]
fn test_full_run_through_cli() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    let config = output.path().join("no-config.toml");
    let out_root = output.path().join("sorted");
    fs::write(input.path().join("a.txt"), "hello").unwrap();
    fs::write(input.path().join("b.txt"), "hello").unwrap();
    fs::write(input.path().join("c.log"), "world").unwrap();

    let result = dupesort::run_app(parse(&[
        "-q",
        "--in",
        input.path().to_str().unwrap(),
        "--out",
        out_root.to_str().unwrap(),
        "--workers",
        "2",
        "--queue-capacity",
        "1",
        "--config",
        config.to_str().unwrap(),
    ]))
    .unwrap();

    assert_eq!(result, ExitCode::Success);
    assert_eq!(fs::read_dir(out_root.join("txt")).unwrap().count(), 1);
    assert!(out_root.join("log/c.log").is_file());
}

#[test]
fn test_fatal_error_is_returned() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    let config = output.path().join("no-config.toml");
    fs::write(input.path().join("a.txt"), "a").unwrap();
    let blocked = output.path().join("blocked");
    fs::write(&blocked, "file").unwrap();

    let err = dupesort::run_app(parse(&[
        "-q",
        "--in",
        input.path().to_str().unwrap(),
        "--out",
        blocked.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]))
    .unwrap_err();

    let message = format!("{err:#}");
    assert!(message.contains("Run aborted"));
    assert!(message.contains("Could not create directory"));
}
