//! dupesort - copy every distinct file once, sorted by extension
//!
//! Walks an input directory tree, hashes each regular file with BLAKE3 on a
//! fixed pool of workers, and copies the first file seen for each digest into
//! `<out>/<extension>/<file name>`.
//!
//! The work runs as a three-stage pipeline connected by bounded queues; see
//! [`pipeline`] for the stage wiring and shutdown order.

pub mod cli;
pub mod config;
pub mod copier;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod policy;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytesize::ByteSize;
use clap::CommandFactory;

use crate::cli::Cli;
use crate::config::Config;
use crate::error::ExitCode;
use crate::pipeline::{Pipeline, RunSummary};
use crate::progress::Progress;

/// Run the application with parsed CLI arguments.
///
/// Missing or unusable `--in`/`--out` values print the usage text and return
/// [`ExitCode::Success`] without doing any work.
///
/// # Errors
///
/// Returns an error if the pipeline aborts on a fatal failure.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let Some((input, output)) = resolve_roots(&cli)? else {
        return Ok(ExitCode::Success);
    };

    let mut config = Config::load(cli.config.as_deref());
    config.merge_cli(&cli);
    log::debug!("Effective config: {:?}", config);

    let mut pipeline_config = config.pipeline_config();
    if config.progress && !cli.quiet {
        pipeline_config = pipeline_config.with_progress_callback(Arc::new(Progress::new()));
    }

    let pipeline = Pipeline::new(pipeline_config);
    let summary = pipeline
        .run(&input, &output)
        .with_context(|| format!("Run aborted while sorting {}", input.display()))?;

    log_summary(&summary);
    Ok(ExitCode::Success)
}

/// Validate both roots, printing usage when either is missing or unusable.
fn resolve_roots(cli: &Cli) -> Result<Option<(PathBuf, PathBuf)>> {
    let (Some(input), Some(output)) = (cli.input.as_deref(), cli.output.as_deref()) else {
        print_usage()?;
        return Ok(None);
    };

    let input = match resolve_input(input) {
        Some(path) => path,
        None => {
            eprintln!("Invalid --in path: {} is not a directory", input.display());
            print_usage()?;
            return Ok(None);
        }
    };

    let output = match std::path::absolute(output) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Invalid --out path {}: {}", output.display(), e);
            print_usage()?;
            return Ok(None);
        }
    };

    Ok(Some((input, output)))
}

fn resolve_input(path: &Path) -> Option<PathBuf> {
    let absolute = std::path::absolute(path).ok()?;
    absolute.is_dir().then_some(absolute)
}

fn print_usage() -> Result<()> {
    Cli::command()
        .print_help()
        .context("Failed to print usage")?;
    println!();
    Ok(())
}

fn log_summary(summary: &RunSummary) {
    log::info!(
        "Copied {} distinct files ({}) into {} buckets",
        summary.files_copied,
        ByteSize::b(summary.bytes_copied),
        summary.buckets_created
    );
    if summary.duplicates_skipped > 0 {
        log::info!("Skipped {} duplicate files", summary.duplicates_skipped);
    }
    if summary.hash_failures > 0 || summary.copy_failures > 0 {
        log::warn!(
            "{} files could not be hashed, {} copies failed",
            summary.hash_failures,
            summary.copy_failures
        );
    }
}
