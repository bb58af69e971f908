//! Progress reporting utilities using indicatif.
//!
//! This module provides the [`Progress`] struct which implements [`ProgressCallback`]
//! to display one spinner per pipeline stage. All three stages run at the same
//! time, so every callback names the [`Phase`] it belongs to.
//!
//! Totals are unknown while the walk is still running, which is why the
//! stages are shown as counting spinners rather than bars.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// A pipeline stage that reports progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Directory traversal.
    Walking,
    /// Content hashing on the worker pool.
    Hashing,
    /// Deduplicating copy into the output tree.
    Copying,
}

impl Phase {
    /// Short lowercase name of the phase.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Walking => "walking",
            Self::Hashing => "hashing",
            Self::Copying => "copying",
        }
    }
}

/// Progress callback for pipeline stages.
///
/// Implementations must be cheap: `on_progress` is called once per file from
/// the stage's own thread.
pub trait ProgressCallback: Send + Sync {
    /// Called when a stage starts.
    fn on_phase_start(&self, phase: Phase);

    /// Called after a stage has processed an item.
    ///
    /// # Arguments
    ///
    /// * `phase` - Stage reporting the progress
    /// * `current` - Number of items the stage has processed so far
    /// * `path` - Path of the item just processed
    fn on_progress(&self, phase: Phase, current: usize, path: &Path);

    /// Called when a stage has finished.
    fn on_phase_end(&self, phase: Phase);
}

/// Progress reporter using indicatif.
pub struct Progress {
    multi: MultiProgress,
    walking: Mutex<Option<ProgressBar>>,
    hashing: Mutex<Option<ProgressBar>>,
    copying: Mutex<Option<ProgressBar>>,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupesort::progress::Progress;
    ///
    /// let progress = Progress::new();
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            walking: Mutex::new(None),
            hashing: Mutex::new(None),
            copying: Mutex::new(None),
        }
    }

    fn slot(&self, phase: Phase) -> &Mutex<Option<ProgressBar>> {
        match phase {
            Phase::Walking => &self.walking,
            Phase::Hashing => &self.hashing,
            Phase::Copying => &self.copying,
        }
    }

    fn style(phase: Phase) -> ProgressStyle {
        let template = match phase {
            Phase::Walking => "{spinner:.green} {prefix:<8} [{elapsed_precise}] {pos} files found {msg}",
            Phase::Hashing => "{spinner:.cyan} {prefix:<8} [{elapsed_precise}] {pos} files hashed {msg}",
            Phase::Copying => "{spinner:.blue} {prefix:<8} [{elapsed_precise}] {pos} files processed {msg}",
        };
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: Phase) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(Self::style(phase));
        pb.set_prefix(phase.as_str());
        pb.enable_steady_tick(Duration::from_millis(100));
        if let Ok(mut slot) = self.slot(phase).lock() {
            *slot = Some(pb);
        }
    }

    fn on_progress(&self, phase: Phase, current: usize, path: &Path) {
        if let Ok(slot) = self.slot(phase).lock() {
            if let Some(ref pb) = *slot {
                pb.set_position(current as u64);
                pb.set_message(truncate_path(path, 40));
            }
        }
    }

    fn on_phase_end(&self, phase: Phase) {
        let finished = self.slot(phase).lock().ok().and_then(|mut slot| slot.take());
        if let Some(pb) = finished {
            pb.finish_with_message("done");
        }
    }
}

/// Truncate a path for display next to a spinner.
fn truncate_path(path: &Path, max_len: usize) -> String {
    let full = path.to_string_lossy();
    if full.chars().count() <= max_len {
        return full.into_owned();
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let count = file_name.chars().count();
    if count >= max_len {
        let tail: String = file_name.chars().skip(count + 3 - max_len).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
