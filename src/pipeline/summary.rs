//! Scoped summary logging.
//!
//! A [`CountReport`] counts items for a stage and logs the total when it is
//! dropped, so the summary line appears whether the stage finished normally,
//! returned an error early or unwound.

/// Counter that logs `"<label>: <count>"` at info level on drop.
#[derive(Debug)]
pub struct CountReport {
    label: &'static str,
    count: usize,
}

impl CountReport {
    /// Create a report starting at zero.
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self { label, count: 0 }
    }

    /// Add one to the count.
    pub fn increment(&mut self) {
        self.count += 1;
    }

    /// Current count.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Summary line logged on drop.
    #[must_use]
    pub fn line(&self) -> String {
        format!("{}: {}", self.label, self.count)
    }
}

impl Drop for CountReport {
    fn drop(&mut self) {
        log::info!("{}", self.line());
    }
}
