//! Directory walker: the producer stage of the pipeline.
//!
//! # Overview
//!
//! The [`Walker`] visits every entry below a root directory with [`walkdir`]
//! on a single thread and sends one [`FileRecord`] per regular file into the
//! hashing queue. Directories, symlinks, devices and sockets are skipped;
//! symlinks are never followed.
//!
//! Sending blocks while the queue is full, so a slow hash pool throttles the
//! walk. When the walk ends the caller drops its sender, which closes the queue.
//!
//! # Failures
//!
//! - An unreadable directory entry is a [`FailureSite::WalkEntry`] failure.
//! - An entry whose absolute path cannot be resolved is a
//!   [`FailureSite::ResolvePath`] failure and ends the walk with an error.
//!
//! # Example
//!
//! ```no_run
//! use dupesort::scanner::Walker;
//! use std::path::Path;
//!
//! let (tx, rx) = crossbeam_channel::bounded(1024);
//! let handle = std::thread::spawn(move || Walker::new(Path::new("/data")).run(&tx));
//! let names: Vec<_> = rx.iter().map(|record| record.name).collect();
//! let found = handle.join().unwrap().unwrap();
//! assert_eq!(found, names.len());
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crossbeam_channel::Sender;
use walkdir::WalkDir;

use super::{FileRecord, ScanError};
use crate::pipeline::summary::CountReport;
use crate::policy::{FailureSite, Policy};
use crate::progress::{Phase, ProgressCallback};

/// Directory walker producing [`FileRecord`]s.
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Optional abort flag shared with the other stages
    abort_flag: Option<Arc<AtomicBool>>,
    /// Optional progress reporting
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("root", &self.root)
            .field("abort_flag", &self.abort_flag.is_some())
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl Walker {
    /// Create a new walker for the given root directory.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            abort_flag: None,
            progress_callback: None,
        }
    }

    /// Set the abort flag.
    ///
    /// Once the flag is set the walker stops before sending the next record.
    #[must_use]
    pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort_flag = Some(flag);
        self
    }

    /// Report walk progress to a callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Root directory of this walker.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree and send every regular file to `out`.
    ///
    /// Returns the number of regular files discovered. The count includes
    /// files that turn out to be duplicates; it is also logged as
    /// `Total files found` on every exit path.
    ///
    /// The walk stops early, without error, if the abort flag is set or if
    /// every receiver of `out` has gone away.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] for any failure whose [`FailureSite`] policy is
    /// [`Policy::Abort`].
    pub fn run(&self, out: &Sender<FileRecord>) -> Result<usize, ScanError> {
        let mut report = CountReport::new("Total files found");

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(Phase::Walking);
        }

        log::debug!("Walking {}", self.root.display());

        for entry_result in WalkDir::new(&self.root).follow_links(false) {
            if crate::signal::is_set(self.abort_flag.as_ref()) {
                log::debug!("Walker: abort requested, stopping traversal");
                break;
            }

            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map_or_else(|| self.root.clone(), Path::to_path_buf);
                    let err = ScanError::Walk { path, source: e };
                    match FailureSite::WalkEntry.policy() {
                        Policy::Continue => {
                            log::warn!("Warning skipping entry: {}", err);
                            continue;
                        }
                        Policy::Abort => return Err(err),
                    }
                }
            };

            // Without following links this is the lstat type: symlinks,
            // devices, fifos and sockets are all rejected here.
            if !entry.file_type().is_file() {
                continue;
            }

            report.increment();

            let full_path = match std::path::absolute(entry.path()) {
                Ok(path) => path,
                Err(e) => {
                    let err = ScanError::ResolvePath {
                        path: entry.path().to_path_buf(),
                        source: e,
                    };
                    match FailureSite::ResolvePath.policy() {
                        Policy::Continue => {
                            log::warn!("Warning skipping file: {}", err);
                            continue;
                        }
                        Policy::Abort => {
                            log::error!("{}", err);
                            return Err(err);
                        }
                    }
                }
            };

            log::trace!("Found file: {}", full_path.display());

            if let Some(ref callback) = self.progress_callback {
                callback.on_progress(Phase::Walking, report.count(), &full_path);
            }

            if out.send(FileRecord::new(full_path)).is_err() {
                log::debug!("Walker: hash queue closed, stopping traversal");
                break;
            }
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(Phase::Walking);
        }

        Ok(report.count())
    }
}
