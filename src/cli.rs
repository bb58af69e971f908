//! Command-line interface definitions for dupesort.
//!
//! `--in` and `--out` are optional at the parser level on purpose: when either
//! is missing, [`crate::run_app`] prints the usage text and exits successfully
//! without doing any work.
//!
//! # Example
//!
//! ```bash
//! # Copy every distinct file of ~/Downloads into ~/Sorted/<extension>/
//! dupesort --in ~/Downloads --out ~/Sorted
//!
//! # Fewer hash workers and smaller queues on a slow disk
//! dupesort --in /mnt/hdd --out /mnt/sorted --workers 2 --queue-capacity 64
//!
//! # Verbose mode for debugging
//! dupesort -v --in ./in --out ./out
//! ```

use clap::builder::RangedU64ValueParser;
use clap::Parser;
use std::path::PathBuf;

/// Copy each distinct file once, organized into folders by extension.
///
/// dupesort walks the input tree, hashes every regular file (BLAKE3), and
/// copies the first file seen for each content hash to
/// `<out>/<extension>/<file name>`. Files without an extension go to
/// `<out>/no-extension/`.
#[derive(Debug, Parser)]
#[command(name = "dupesort")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input root directory to scan
    #[arg(long = "in", value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Output root directory to copy distinct files into
    #[arg(long = "out", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Number of hash workers (default: 10). More is not always better
    #[arg(long, value_name = "N", value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub workers: Option<usize>,

    /// Capacity of each pipeline queue (default: 1024)
    ///
    /// Bounds memory use; a full queue blocks the stage that feeds it.
    #[arg(long, value_name = "N", value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub queue_capacity: Option<usize>,

    /// Configuration file (TOML)
    ///
    /// If not specified, the platform-specific default location is used.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Show progress spinners for the walk, hash and copy stages
    #[arg(long)]
    pub progress: bool,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Report fatal errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,
}
