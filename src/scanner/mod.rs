//! Scanner module for directory traversal and file hashing.
//!
//! This module provides the first two stages of the pipeline:
//! - Sequential directory walking using walkdir
//! - Streaming content hashing with BLAKE3 on a fixed worker pool
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and [`FileRecord`] production
//! - [`hasher`]: BLAKE3 file hashing (streaming) and the hash worker pool
//!
//! # Example
//!
//! ```no_run
//! use dupesort::scanner::{FileRecord, Walker};
//! use std::path::Path;
//!
//! let (tx, rx) = crossbeam_channel::bounded::<FileRecord>(16);
//! let walker = Walker::new(Path::new("/data/photos"));
//! std::thread::spawn(move || walker.run(&tx));
//! for record in rx {
//!     println!("{} -> bucket {}", record.full_path.display(), record.bucket().to_string_lossy());
//! }
//! ```

pub mod hasher;
pub mod walker;

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

// Re-export main types
pub use hasher::{hash_to_hex, HashPool, Hasher};
pub use walker::Walker;

/// A BLAKE3 content digest.
pub type Hash = [u8; 32];

/// Bucket label used for files whose extension is empty.
pub const NO_EXTENSION_BUCKET: &str = "no-extension";

/// One regular file travelling through the pipeline.
///
/// `full_path`, `name` and `extension` are fixed at creation by the walker.
/// `digest` is written exactly once by the hash worker that owns the record;
/// `None` after hashing means the file could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path to the file
    pub full_path: PathBuf,
    /// Base file name including the extension
    pub name: OsString,
    /// Final suffix of the name including the leading `.`, or empty
    pub extension: OsString,
    /// Content digest, absent until hashed or if hashing failed
    pub digest: Option<Hash>,
}

impl FileRecord {
    /// Create a record for an absolute file path.
    ///
    /// The name is the final path component; the extension is derived from it
    /// with [`os_extension_of`].
    #[must_use]
    pub fn new(full_path: PathBuf) -> Self {
        let name = full_path
            .file_name()
            .map(ToOwned::to_owned)
            .unwrap_or_default();
        let extension = os_extension_of(&name);

        Self {
            full_path,
            name,
            extension,
            digest: None,
        }
    }

    /// Output bucket this record belongs to.
    #[must_use]
    pub fn bucket(&self) -> OsString {
        os_bucket_for(&self.extension)
    }
}

/// Return the final suffix of a file name, including the leading `.`.
///
/// Only the last suffix counts (`archive.tar.gz` yields `.gz`). A leading dot
/// is a suffix too, so `.bashrc` yields `.bashrc`, and a trailing dot yields `.`.
/// Names without any `.` yield an empty string.
#[must_use]
pub fn extension_of(name: &str) -> &str {
    name.rfind('.').map_or("", |idx| &name[idx..])
}

/// Normalize an extension into its output bucket name.
///
/// Strips a single leading `.`; an empty result maps to [`NO_EXTENSION_BUCKET`].
/// Matching is case-sensitive: `.TXT` and `.txt` are different buckets.
#[must_use]
pub fn bucket_for(extension: &str) -> &str {
    let stripped = extension.strip_prefix('.').unwrap_or(extension);
    if stripped.is_empty() {
        NO_EXTENSION_BUCKET
    } else {
        stripped
    }
}

/// [`extension_of`] for OS file names.
///
/// On Unix the name is split on its raw bytes, so a suffix that is not valid
/// UTF-8 is kept byte for byte instead of being replaced with U+FFFD.
#[must_use]
pub fn os_extension_of(name: &OsStr) -> OsString {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        let bytes = name.as_bytes();
        let suffix = bytes
            .iter()
            .rposition(|&b| b == b'.')
            .map_or(&[][..], |idx| &bytes[idx..]);
        OsStr::from_bytes(suffix).to_os_string()
    }

    #[cfg(not(unix))]
    {
        OsString::from(extension_of(&name.to_string_lossy()))
    }
}

/// [`bucket_for`] for OS extensions, byte-preserving on Unix.
#[must_use]
pub fn os_bucket_for(extension: &OsStr) -> OsString {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        let bytes = extension.as_bytes();
        let stripped = bytes.strip_prefix(b".").unwrap_or(bytes);
        if stripped.is_empty() {
            OsString::from(NO_EXTENSION_BUCKET)
        } else {
            OsStr::from_bytes(stripped).to_os_string()
        }
    }

    #[cfg(not(unix))]
    {
        OsString::from(bucket_for(&extension.to_string_lossy()))
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The input root does not exist or is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An absolute path could not be resolved for an entry.
    #[error("Could not get absolute path of {path}: {source}")]
    ResolvePath {
        /// Path as reported by the walk
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A directory entry could not be read.
    #[error("Could not walk path {path}: {source}")]
    Walk {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying walk error
        #[source]
        source: walkdir::Error,
    },
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify an I/O error raised while hashing `path`.
    #[must_use]
    pub fn from_io(path: &std::path::Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
