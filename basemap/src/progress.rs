//! Progress and status reporting.
//!
//! The background worker reports coarse milestones through a
//! [`ProgressSink`]. Hosts decide how to present them: [`TracingProgress`]
//! logs, [`RecordingProgress`] keeps them for inspection, and the CLI draws a
//! progress bar.

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Receiver of job progress.
pub trait ProgressSink: Send + Sync {
    /// Job reached `percent` (0-100).
    fn report(&self, percent: u8, message: &str);

    /// Job finished or was abandoned; clear any indicator.
    fn reset(&self);

    /// Job failed with a user-facing message.
    fn error(&self, message: &str);
}

/// Logs progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, percent: u8, message: &str) {
        debug!(percent, "{}", message);
    }

    fn reset(&self) {}

    fn error(&self, message: &str) {
        warn!("{}", message);
    }
}

/// One recorded progress call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Report { percent: u8, message: String },
    Reset,
    Error(String),
}

/// Records every call, for tests and headless hosts.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    /// Percentages reported so far, in order.
    pub fn percentages(&self) -> Vec<u8> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Report { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Error(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, percent: u8, message: &str) {
        self.events.lock().push(ProgressEvent::Report {
            percent,
            message: message.to_string(),
        });
    }

    fn reset(&self) {
        self.events.lock().push(ProgressEvent::Reset);
    }

    fn error(&self, message: &str) {
        self.events
            .lock()
            .push(ProgressEvent::Error(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_progress() {
        let progress = RecordingProgress::new();
        progress.report(10, "start");
        progress.report(50, "half");
        progress.error("boom");
        progress.reset();

        assert_eq!(progress.percentages(), vec![10, 50]);
        assert_eq!(progress.errors(), vec!["boom".to_string()]);
        assert_eq!(progress.events().last(), Some(&ProgressEvent::Reset));

        progress.clear();
        assert!(progress.events().is_empty());
    }
}
