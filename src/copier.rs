//! Deduplicating copier: the consumer stage of the pipeline.
//!
//! The [`Copier`] drains the copy queue on a single thread and copies the first
//! file seen for each digest to `<output>/<bucket>/<name>`, where the bucket is
//! the file's extension without its leading `.` (or `no-extension`).
//!
//! All run state lives in the copier and is touched by that one thread only:
//!
//! - `seen_digests` grows by one entry for every record that was dispatched
//!   for copying, whether the copy succeeded or failed. A failed copy is
//!   therefore never retried, and later duplicates of it are dropped too.
//! - `initialized_buckets` remembers which bucket directories exist already.
//!
//! Records without a digest (hashing failed) share one "no digest" key: the
//! first one is dispatched, every later one is dropped.
//!
//! The destination is addressed by name only. Two different files with the
//! same name and bucket both get copied, and the later copy overwrites the
//! earlier one. A source that already is the destination (output root inside
//! the input tree, or a hard link) is never truncated: the copy is skipped
//! with a warning.

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::pipeline::summary::CountReport;
use crate::policy::{FailureSite, Policy};
use crate::progress::{Phase, ProgressCallback};
use crate::scanner::{hash_to_hex, FileRecord, Hash};

/// Errors raised while copying a file into the output tree.
#[derive(thiserror::Error, Debug)]
pub enum CopyError {
    /// A bucket directory could not be created.
    #[error("Could not create directory {path}: {source}")]
    CreateBucket {
        /// Directory that could not be created
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The source file could not be opened.
    #[error("Could not open source file {path}: {source}")]
    OpenSource {
        /// Source path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The destination file could not be created.
    #[error("Could not open destination file {path}: {source}")]
    CreateDestination {
        /// Destination path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Reading the source or writing the destination failed mid-copy.
    #[error("Could not copy data from {src} to {dest}: {source}")]
    Transfer {
        /// Source path
        src: PathBuf,
        /// Destination path
        dest: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The destination is the source file itself.
    #[error("Source and destination are the same file: {path}")]
    SameFile {
        /// Path of the file
        path: PathBuf,
    },

    /// Buffered data could not be flushed to the destination.
    #[error("Could not close destination file {path}: {source}")]
    Flush {
        /// Destination path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl CopyError {
    /// Failure site this error belongs to.
    #[must_use]
    pub fn site(&self) -> FailureSite {
        match self {
            Self::CreateBucket { .. } => FailureSite::CreateBucket,
            Self::OpenSource { .. } => FailureSite::CopySource,
            Self::CreateDestination { .. }
            | Self::SameFile { .. }
            | Self::Transfer { .. }
            | Self::Flush { .. } => FailureSite::CopyDestination,
        }
    }
}

/// Copy the full content of `src` to `dest`, replacing any existing file.
///
/// The source is opened before the destination is touched, so an unreadable
/// source leaves no empty file behind. If `dest` already is the source file
/// nothing is written. A copy that fails midway removes the partial
/// destination. Both handles are closed before this returns.
///
/// # Errors
///
/// Returns [`CopyError`] naming the step that failed.
pub fn copy_file(src: &Path, dest: &Path) -> Result<u64, CopyError> {
    let input = File::open(src).map_err(|source| CopyError::OpenSource {
        path: src.to_path_buf(),
        source,
    })?;

    let src_meta = input.metadata().map_err(|source| CopyError::OpenSource {
        path: src.to_path_buf(),
        source,
    })?;
    if is_same_file(src, &src_meta, dest) {
        return Err(CopyError::SameFile {
            path: dest.to_path_buf(),
        });
    }

    let output = File::create(dest).map_err(|source| CopyError::CreateDestination {
        path: dest.to_path_buf(),
        source,
    })?;

    let mut reader = BufReader::new(input);
    let mut writer = BufWriter::new(output);

    let copied = io::copy(&mut reader, &mut writer)
        .map_err(|source| CopyError::Transfer {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
            source,
        })
        .and_then(|bytes| {
            writer.flush().map_err(|source| CopyError::Flush {
                path: dest.to_path_buf(),
                source,
            })?;
            Ok(bytes)
        });

    drop(writer);
    if copied.is_err() {
        // Leave no partial file behind
        if let Err(e) = fs::remove_file(dest) {
            log::debug!("Could not remove partial copy {}: {}", dest.display(), e);
        }
    }
    copied
}

/// Whether `dest` exists and is the same file as the opened source.
#[cfg(unix)]
fn is_same_file(_src: &Path, src_meta: &fs::Metadata, dest: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    fs::metadata(dest).is_ok_and(|dest_meta| {
        dest_meta.dev() == src_meta.dev() && dest_meta.ino() == src_meta.ino()
    })
}

/// Whether `dest` exists and is the same file as the opened source.
#[cfg(not(unix))]
fn is_same_file(src: &Path, _src_meta: &fs::Metadata, dest: &Path) -> bool {
    match (fs::canonicalize(src), fs::canonicalize(dest)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Create a bucket directory (and any missing parents) with mode 0755 on Unix.
fn create_bucket_dir(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(path)
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The file was copied.
    Copied {
        /// Destination path
        dest: PathBuf,
        /// Bytes written
        bytes: u64,
    },
    /// The digest was already seen; nothing was done.
    Duplicate,
    /// The copy was attempted and failed; the digest is now marked as seen.
    Failed,
}

/// Counters kept by the copier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyStats {
    /// Records received from the hash pool
    pub received: usize,
    /// Records that arrived without a digest
    pub hash_failures: usize,
    /// Files successfully copied
    pub files_copied: usize,
    /// Records dropped because their digest was already seen
    pub duplicates_skipped: usize,
    /// Copies that were attempted and failed
    pub copy_failures: usize,
    /// Bucket directories created during the run
    pub buckets_created: usize,
    /// Total bytes written to the output tree
    pub bytes_copied: u64,
}

/// Single-threaded deduplicating copier.
pub struct Copier {
    output_root: PathBuf,
    seen_digests: HashSet<Option<Hash>>,
    initialized_buckets: HashSet<OsString>,
    stats: CopyStats,
    abort_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Copier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Copier")
            .field("output_root", &self.output_root)
            .field("seen_digests", &self.seen_digests.len())
            .field("initialized_buckets", &self.initialized_buckets)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Copier {
    /// Create a copier writing below `output_root`.
    #[must_use]
    pub fn new(output_root: &Path) -> Self {
        Self {
            output_root: output_root.to_path_buf(),
            seen_digests: HashSet::new(),
            initialized_buckets: HashSet::new(),
            stats: CopyStats::default(),
            abort_flag: None,
            progress_callback: None,
        }
    }

    /// Set the abort flag checked before each record.
    #[must_use]
    pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort_flag = Some(flag);
        self
    }

    /// Report copy progress to a callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> &CopyStats {
        &self.stats
    }

    /// Whether a digest has already been dispatched for copying.
    #[must_use]
    pub fn has_seen(&self, digest: Option<&Hash>) -> bool {
        self.seen_digests.contains(&digest.copied())
    }

    /// Whether a bucket directory has been created during this run.
    #[must_use]
    pub fn has_bucket(&self, bucket: impl AsRef<OsStr>) -> bool {
        self.initialized_buckets.contains(bucket.as_ref())
    }

    /// Process one record.
    ///
    /// # Errors
    ///
    /// Returns [`CopyError`] only for failures whose policy is
    /// [`Policy::Abort`]; everything else is logged and reported as
    /// [`CopyOutcome::Failed`].
    pub fn process(&mut self, record: FileRecord) -> Result<CopyOutcome, CopyError> {
        self.stats.received += 1;
        if record.digest.is_none() {
            self.stats.hash_failures += 1;
        }

        if self.seen_digests.contains(&record.digest) {
            log::trace!("Skipping duplicate: {}", record.full_path.display());
            self.stats.duplicates_skipped += 1;
            return Ok(CopyOutcome::Duplicate);
        }

        let outcome = match self.copy_record(&record) {
            Ok((dest, bytes)) => {
                log::debug!(
                    "Copied {} -> {} ({})",
                    record.full_path.display(),
                    dest.display(),
                    record.digest.as_ref().map_or_else(|| "no digest".to_string(), hash_to_hex)
                );
                self.stats.files_copied += 1;
                self.stats.bytes_copied += bytes;
                CopyOutcome::Copied { dest, bytes }
            }
            Err(e) => match e.site().policy() {
                Policy::Continue => {
                    log::warn!("Warning skipping file: {}", e);
                    self.stats.copy_failures += 1;
                    CopyOutcome::Failed
                }
                Policy::Abort => {
                    log::error!("Fatal Error: {}", e);
                    return Err(e);
                }
            },
        };

        self.seen_digests.insert(record.digest);
        Ok(outcome)
    }

    fn copy_record(&mut self, record: &FileRecord) -> Result<(PathBuf, u64), CopyError> {
        let bucket = record.bucket();
        let dir = self.output_root.join(&bucket);

        if !self.initialized_buckets.contains(&bucket) {
            create_bucket_dir(&dir).map_err(|source| CopyError::CreateBucket {
                path: dir.clone(),
                source,
            })?;
            log::debug!("Created bucket directory {}", dir.display());
            self.initialized_buckets.insert(bucket);
            self.stats.buckets_created += 1;
        }

        let dest = dir.join(&record.name);
        let bytes = copy_file(&record.full_path, &dest)?;
        Ok((dest, bytes))
    }

    /// Drain `input` until it is closed and empty.
    ///
    /// Logs `Total files copied` on every exit path.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`CopyError`]; the remaining records are left
    /// in the queue.
    pub fn run(mut self, input: &Receiver<FileRecord>) -> Result<CopyStats, CopyError> {
        let mut report = CountReport::new("Total files copied");

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(Phase::Copying);
        }

        for record in input.iter() {
            if crate::signal::is_set(self.abort_flag.as_ref()) {
                log::debug!("Copier: abort requested, stopping");
                break;
            }

            let path = record.full_path.clone();
            if let CopyOutcome::Copied { .. } = self.process(record)? {
                report.increment();
            }

            if let Some(ref callback) = self.progress_callback {
                callback.on_progress(Phase::Copying, self.stats.received, &path);
            }
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(Phase::Copying);
        }

        Ok(self.stats)
    }
}
