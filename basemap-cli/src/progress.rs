//! Terminal progress bar for render jobs.

use basemap::progress::ProgressSink;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Shows job milestones on an `indicatif` bar.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        Self { bar }
    }

    /// Hidden bar, for non-interactive output.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for BarProgress {
    fn report(&self, percent: u8, message: &str) {
        self.bar.set_position(u64::from(percent));
        self.bar.set_message(message.to_string());
    }

    fn reset(&self) {
        self.bar.set_position(0);
        self.bar.set_message("");
    }

    fn error(&self, message: &str) {
        self.bar
            .println(format!("{} {}", style("✗").red().bold(), message));
    }
}
