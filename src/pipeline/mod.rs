//! Pipeline orchestration.
//!
//! Wires the three stages together:
//!
//! ```text
//! Walker ──[walk queue]──▶ HashPool (N workers) ──[copy queue]──▶ Copier
//! ```
//!
//! Both queues are bounded crossbeam channels of the configured capacity, so a
//! slow stage blocks the one upstream of it. Queues close by sender drop:
//!
//! 1. The walker thread reports its count, then drops the only walk sender.
//! 2. Each hash worker drains the walk queue, reports its exit and drops its
//!    copy sender. The copy queue closes when the last worker is gone.
//! 3. The copier drains the copy queue and reports its stats.
//!
//! The orchestrator returns once the copier has reported. A fatal error from
//! any stage is returned immediately without waiting for the others; the
//! shared abort flag makes the abandoned stages stop taking new work.

pub mod summary;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{bounded, unbounded};

use crate::copier::{CopyError, CopyStats, Copier};
use crate::progress::ProgressCallback;
use crate::scanner::{FileRecord, HashError, HashPool, ScanError, Walker};
use crate::signal::AbortHandle;

/// Default number of hash workers.
pub const DEFAULT_WORKERS: usize = 10;

/// Default capacity of each queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Messages sent from the stages to the orchestrator.
#[derive(Debug)]
pub enum StageEvent {
    /// The walker finished, successfully or not.
    Walked(Result<usize, ScanError>),
    /// A hash worker hit a failure whose policy is abort.
    HashFailed(HashError),
    /// A hash worker exited.
    WorkerExited {
        /// Worker index
        id: usize,
        /// Records this worker forwarded
        processed: usize,
    },
    /// The copier finished, successfully or not.
    Copied(Result<CopyStats, CopyError>),
}

/// Errors that end a pipeline run.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// Traversal failed.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Hashing failed fatally.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// Copying failed fatally.
    #[error(transparent)]
    Copy(#[from] CopyError),

    /// The output root could not be made absolute.
    #[error("Invalid output path {path}: {source}")]
    OutputRoot {
        /// Output path as given
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The hash worker pool could not be built.
    #[error("Failed to build hash worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A stage thread could not be started.
    #[error("Failed to spawn {stage} thread: {source}")]
    Spawn {
        /// Stage name
        stage: &'static str,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A stage went away without reporting a result.
    #[error("Pipeline stage '{0}' stopped without reporting a result")]
    StageLost(&'static str),
}

/// Configuration for a pipeline run.
#[derive(Clone)]
pub struct PipelineConfig {
    /// Number of hash workers.
    pub workers: usize,
    /// Capacity of the walk queue and of the copy queue.
    pub queue_capacity: usize,
    /// Optional progress reporting for all stages.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            progress_callback: None,
        }
    }
}

impl PipelineConfig {
    /// Set the number of hash workers (at least one).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the capacity of both queues (at least one).
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Regular files discovered by the walker
    pub files_found: usize,
    /// Files successfully copied
    pub files_copied: usize,
    /// Files dropped because their digest was already seen
    pub duplicates_skipped: usize,
    /// Files that could not be hashed
    pub hash_failures: usize,
    /// Copies that were attempted and failed
    pub copy_failures: usize,
    /// Bucket directories created
    pub buckets_created: usize,
    /// Bytes written to the output tree
    pub bytes_copied: u64,
}

impl RunSummary {
    fn new(files_found: usize, stats: CopyStats) -> Self {
        Self {
            files_found,
            files_copied: stats.files_copied,
            duplicates_skipped: stats.duplicates_skipped,
            hash_failures: stats.hash_failures,
            copy_failures: stats.copy_failures,
            buckets_created: stats.buckets_created,
            bytes_copied: stats.bytes_copied,
        }
    }
}

/// Runs the walk, hash and copy stages for one input/output pair.
///
/// # Example
///
/// ```no_run
/// use dupesort::pipeline::{Pipeline, PipelineConfig};
/// use std::path::Path;
///
/// let pipeline = Pipeline::new(PipelineConfig::default().with_workers(4));
/// let summary = pipeline.run(Path::new("/data/in"), Path::new("/data/out")).unwrap();
/// println!("{} of {} files copied", summary.files_copied, summary.files_found);
/// ```
///
/// Every call to [`Pipeline::run`] gets its own [`AbortHandle`]: stages
/// abandoned by a failed run stay aborted, and the next run starts clean.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    abort: Mutex<AbortHandle>,
}

impl Pipeline {
    /// Create a pipeline with the given configuration.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            abort: Mutex::new(AbortHandle::new()),
        }
    }

    /// Create a pipeline with the default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(PipelineConfig::default())
    }

    /// Configuration of this pipeline.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Abort handle shared with the stages of the most recent run.
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort
            .lock()
            .map(|handle| handle.clone())
            .unwrap_or_default()
    }

    /// Run the pipeline to completion.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error reported by any stage. In-flight work of
    /// the other stages is abandoned.
    pub fn run(&self, input_root: &Path, output_root: &Path) -> Result<RunSummary, PipelineError> {
        let abort = AbortHandle::new();
        if let Ok(mut current) = self.abort.lock() {
            *current = abort.clone();
        }

        let result = self.run_stages(input_root, output_root, abort.get_flag());
        if result.is_err() {
            abort.request_abort();
        }
        result
    }

    fn run_stages(
        &self,
        input_root: &Path,
        output_root: &Path,
        flag: Arc<AtomicBool>,
    ) -> Result<RunSummary, PipelineError> {
        if !input_root.is_dir() {
            return Err(ScanError::NotADirectory(input_root.to_path_buf()).into());
        }
        let input_root = std::path::absolute(input_root).map_err(|source| ScanError::ResolvePath {
            path: input_root.to_path_buf(),
            source,
        })?;
        let output_root =
            std::path::absolute(output_root).map_err(|source| PipelineError::OutputRoot {
                path: output_root.to_path_buf(),
                source,
            })?;

        let capacity = self.config.queue_capacity.max(1);
        let progress = self.config.progress_callback.clone();

        log::info!(
            "Sorting {} into {} with {} hash workers",
            input_root.display(),
            output_root.display(),
            self.config.workers.max(1)
        );

        let (walk_tx, walk_rx) = bounded::<FileRecord>(capacity);
        let (copy_tx, copy_rx) = bounded::<FileRecord>(capacity);
        let (events_tx, events_rx) = unbounded::<StageEvent>();

        // Hash workers hold the only walk receivers and copy senders.
        let mut pool = HashPool::new(self.config.workers)?.with_abort_flag(Arc::clone(&flag));
        if let Some(ref callback) = progress {
            pool = pool.with_progress_callback(Arc::clone(callback));
        }
        pool.spawn(&walk_rx, &copy_tx, &events_tx);
        drop(walk_rx);
        drop(copy_tx);

        let mut copier = Copier::new(&output_root).with_abort_flag(Arc::clone(&flag));
        if let Some(ref callback) = progress {
            copier = copier.with_progress_callback(Arc::clone(callback));
        }
        let copier_events = events_tx.clone();
        let copier_handle = thread::Builder::new()
            .name("copier".to_string())
            .spawn(move || {
                let result = copier.run(&copy_rx);
                let _ = copier_events.send(StageEvent::Copied(result));
            })
            .map_err(|source| PipelineError::Spawn {
                stage: "copier",
                source,
            })?;

        let mut walker = Walker::new(&input_root).with_abort_flag(flag);
        if let Some(ref callback) = progress {
            walker = walker.with_progress_callback(Arc::clone(callback));
        }
        let walker_events = events_tx.clone();
        let walker_handle = thread::Builder::new()
            .name("walker".to_string())
            .spawn(move || {
                let result = walker.run(&walk_tx);
                let _ = walker_events.send(StageEvent::Walked(result));
                // Closes the walk queue
                drop(walk_tx);
            })
            .map_err(|source| PipelineError::Spawn {
                stage: "walker",
                source,
            })?;

        drop(events_tx);

        let mut files_found = None;
        let mut workers_running = pool.workers();

        loop {
            let event = events_rx
                .recv()
                .map_err(|_| PipelineError::StageLost("copier"))?;

            match event {
                StageEvent::Walked(Ok(count)) => {
                    log::debug!("Traversal finished, walk queue closed");
                    files_found = Some(count);
                }
                StageEvent::Walked(Err(e)) => return Err(e.into()),
                StageEvent::HashFailed(e) => return Err(e.into()),
                StageEvent::WorkerExited { id, processed } => {
                    workers_running = workers_running.saturating_sub(1);
                    log::trace!("Hash worker {} exited after {} files", id, processed);
                    if workers_running == 0 {
                        log::debug!("All hash workers finished, copy queue closed");
                    }
                }
                StageEvent::Copied(Err(e)) => return Err(e.into()),
                StageEvent::Copied(Ok(stats)) => {
                    let files_found = files_found.ok_or(PipelineError::StageLost("walker"))?;
                    // Both threads have already reported; joining only reaps them.
                    let _ = walker_handle.join();
                    let _ = copier_handle.join();
                    return Ok(RunSummary::new(files_found, stats));
                }
            }
        }
    }
}
