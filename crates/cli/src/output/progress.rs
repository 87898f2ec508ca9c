//! Progress bar for transfers
//!
//! Hidden in quiet, JSON and `--no-progress` modes, and when the size of the
//! transfer is unknown.

use super::OutputConfig;

/// Byte-counting progress bar
///
/// Clones share the same bar, so a reader handed to a worker task can report
/// into it.
#[derive(Debug, Clone)]
pub struct ProgressBar {
    bar: Option<indicatif::ProgressBar>,
}

impl ProgressBar {
    /// Create a progress bar for `total` bytes
    pub fn new(config: OutputConfig, total: u64) -> Self {
        let hidden = config.quiet || config.json || config.no_progress || total == 0;
        let bar = if hidden {
            None
        } else {
            let bar = indicatif::ProgressBar::new(total);
            if let Ok(style) = indicatif::ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            {
                bar.set_style(style.progress_chars("#>-"));
            }
            Some(bar)
        };

        Self { bar }
    }

    /// Increment progress
    pub fn inc(&self, delta: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(delta);
        }
    }

    /// Finish and clear the progress bar
    pub fn finish_and_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }

    /// Check if progress bar is visible
    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }
}
