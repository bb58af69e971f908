//! Abort signalling between pipeline stages.
//!
//! When one stage hits a fatal error the orchestrator stops waiting and
//! returns immediately. The remaining stages are abandoned, but they share an
//! [`AbortHandle`] so they stop taking new work instead of running to
//! completion in the background.
//!
//! # Usage
//!
//! ```rust
//! use dupesort::signal::AbortHandle;
//!
//! let handle = AbortHandle::new();
//! let flag = handle.get_flag();
//! // Pass `flag` to Walker, HashPool and Copier via `with_abort_flag`.
//!
//! handle.request_abort();
//! assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared abort flag for one pipeline run.
///
/// Cloning the handle shares the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    /// Create a handle with no abort requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if an abort has been requested.
    #[must_use]
    pub fn is_abort_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request that all stages stop taking new work.
    pub fn request_abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Get a clone of the flag for passing to stage threads.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

/// Check an optional abort flag.
pub(crate) fn is_set(flag: Option<&Arc<AtomicBool>>) -> bool {
    flag.is_some_and(|f| f.load(Ordering::SeqCst))
}
