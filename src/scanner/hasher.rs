//! BLAKE3 file hasher with streaming support, and the hash worker pool.
//!
//! # Overview
//!
//! [`Hasher`] streams a file through BLAKE3 in fixed-size chunks, so memory
//! use does not grow with file size.
//!
//! [`HashPool`] runs a fixed number of workers on a dedicated rayon pool. The
//! workers compete for records on the walk queue, fill in each record's digest
//! and forward it to the copy queue. Records may leave the pool in a different
//! order than they entered it.
//!
//! A file that cannot be opened or read is logged and forwarded with no
//! digest; one bad file never stalls the pool.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use super::{FileRecord, Hash, HashError};
use crate::pipeline::StageEvent;
use crate::policy::{FailureSite, Policy};
use crate::progress::{Phase, ProgressCallback};

/// Default read buffer size for streaming (64 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Streaming BLAKE3 file hasher.
#[derive(Debug, Clone)]
pub struct Hasher {
    buffer_size: usize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Create a hasher with a custom read buffer size.
    #[must_use]
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }

    /// Hash the entire content of a file.
    ///
    /// The file handle is closed before this returns, on success or failure.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn full_hash(&self, path: &Path) -> Result<Hash, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut hasher = blake3::Hasher::new();

        std::io::copy(&mut reader, &mut hasher).map_err(|e| HashError::from_io(path, e))?;

        Ok(*hasher.finalize().as_bytes())
    }
}

/// Format a digest as lowercase hex.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    blake3::Hash::from(*hash).to_hex().to_string()
}

/// Fixed-size pool of hash workers.
///
/// Each worker owns one record at a time, so the digest is written without
/// any locking on the record itself.
pub struct HashPool {
    pool: rayon::ThreadPool,
    workers: usize,
    hasher: Arc<Hasher>,
    abort_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for HashPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashPool")
            .field("workers", &self.workers)
            .field("hasher", &self.hasher)
            .field("abort_flag", &self.abort_flag.is_some())
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl HashPool {
    /// Build a pool with `workers` dedicated threads (at least one).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying thread pool cannot be created.
    pub fn new(workers: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("hash-worker-{i}"))
            .build()?;

        Ok(Self {
            pool,
            workers,
            hasher: Arc::new(Hasher::new()),
            abort_flag: None,
            progress_callback: None,
        })
    }

    /// Use a specific hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Hasher) -> Self {
        self.hasher = Arc::new(hasher);
        self
    }

    /// Set the abort flag checked before each record.
    #[must_use]
    pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort_flag = Some(flag);
        self
    }

    /// Report hashing progress to a callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Number of workers in the pool.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Start every worker.
    ///
    /// Each worker takes records from `input` until it is closed and drained,
    /// then sends [`StageEvent::WorkerExited`] on `events` and drops its clone
    /// of `output`. The copy queue therefore closes exactly when the last
    /// worker has exited, provided the caller keeps no sender of its own.
    pub fn spawn(
        &self,
        input: &Receiver<FileRecord>,
        output: &Sender<FileRecord>,
        events: &Sender<StageEvent>,
    ) {
        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(Phase::Hashing);
        }

        let hashed = Arc::new(AtomicUsize::new(0));
        let remaining = Arc::new(AtomicUsize::new(self.workers));

        for id in 0..self.workers {
            let worker = Worker {
                id,
                hasher: Arc::clone(&self.hasher),
                input: input.clone(),
                output: output.clone(),
                events: events.clone(),
                abort_flag: self.abort_flag.clone(),
                progress_callback: self.progress_callback.clone(),
                hashed: Arc::clone(&hashed),
                remaining: Arc::clone(&remaining),
            };
            self.pool.spawn(move || worker.run());
        }
    }
}

struct Worker {
    id: usize,
    hasher: Arc<Hasher>,
    input: Receiver<FileRecord>,
    output: Sender<FileRecord>,
    events: Sender<StageEvent>,
    abort_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
    hashed: Arc<AtomicUsize>,
    remaining: Arc<AtomicUsize>,
}

impl Worker {
    fn run(self) {
        let mut processed = 0usize;

        for mut record in self.input.iter() {
            if crate::signal::is_set(self.abort_flag.as_ref()) {
                log::debug!("Hash worker {}: abort requested, exiting", self.id);
                break;
            }

            match self.hasher.full_hash(&record.full_path) {
                Ok(hash) => {
                    log::trace!(
                        "Hashed {} ({})",
                        record.full_path.display(),
                        hash_to_hex(&hash)
                    );
                    record.digest = Some(hash);
                }
                Err(e) => match FailureSite::HashSource.policy() {
                    Policy::Continue => {
                        log::warn!("Warning skipping file: Could not hash {}", e);
                    }
                    Policy::Abort => {
                        let _ = self.events.send(StageEvent::HashFailed(e));
                        break;
                    }
                },
            }

            processed += 1;
            let total = self.hashed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(ref callback) = self.progress_callback {
                callback.on_progress(Phase::Hashing, total, &record.full_path);
            }

            if self.output.send(record).is_err() {
                log::debug!("Hash worker {}: copy queue closed, exiting", self.id);
                break;
            }
        }

        log::trace!("Hash worker {} finished after {} files", self.id, processed);

        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            if let Some(ref callback) = self.progress_callback {
                callback.on_phase_end(Phase::Hashing);
            }
        }

        let _ = self.events.send(StageEvent::WorkerExited {
            id: self.id,
            processed,
        });
    }
}
