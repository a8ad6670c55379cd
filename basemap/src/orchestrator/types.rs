//! Job states, outcomes and errors.

use thiserror::Error;

use crate::coord::Extent;
use crate::provider::FetchError;
use crate::reproject::ReprojectionError;
use crate::stitch::StitchError;

/// State of the worker slot.
///
/// The slot is `Running` while a job (or its restart) is in flight and holds
/// the terminal state of the last job otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    /// No job has run yet.
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl JobState {
    /// True when no job is in flight.
    pub fn is_idle(&self) -> bool {
        !matches!(self, JobState::Running)
    }
}

/// Details of a job that installed a composite.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSummary {
    pub zoom: u8,
    pub tiles: usize,
    pub failed_tiles: usize,
    pub width: u32,
    pub height: u32,
    /// Extent of the installed composite in the canvas projection.
    pub extent: Extent,
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(JobSummary),
    Cancelled,
    Failed(JobError),
}

impl JobOutcome {
    pub fn state(&self) -> JobState {
        match self {
            JobOutcome::Completed(_) => JobState::Completed,
            JobOutcome::Cancelled => JobState::Cancelled,
            JobOutcome::Failed(_) => JobState::Failed,
        }
    }
}

/// Errors that abort a single job.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobError {
    #[error("No tile source selected")]
    NoSource,

    #[error("Canvas has no drawable area ({width}x{height})")]
    EmptyViewport { width: u32, height: u32 },

    #[error("Reprojection failed: {0}")]
    Reprojection(#[from] ReprojectionError),

    #[error("Tile fetch failed: {0}")]
    Fetch(FetchError),

    #[error("Stitching failed: {0}")]
    Stitch(#[from] StitchError),

    #[error("Worker task failed: {0}")]
    Worker(String),

    /// Not a failure: the job observed its cancellation token.
    #[error("Job cancelled")]
    Cancelled,
}

impl From<FetchError> for JobError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Cancelled => JobError::Cancelled,
            other => JobError::Fetch(other),
        }
    }
}
