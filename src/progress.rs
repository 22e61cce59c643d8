//! Progress reporting for bulk inserts.

use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar over a known number of records. Disabled trackers only
/// count.
pub struct ProgressTracker {
    processed: u64,
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `total` - Number of records that will be processed
    /// * `label` - Message shown next to the bar
    /// * `enable_bar` - Whether to display a progress bar
    pub fn new(total: u64, label: &str, enable_bar: bool) -> Self {
        let bar = if enable_bar {
            let bar = ProgressBar::new(total);
            if let Ok(style) =
                ProgressStyle::default_bar().template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
            {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar.set_message(label.to_string());
            Some(bar)
        } else {
            None
        };

        Self { processed: 0, bar }
    }

    pub fn inc(&mut self) {
        self.processed += 1;
        if let Some(ref bar) = self.bar {
            bar.inc(1);
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}
