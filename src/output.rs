//! Result types returned by the pipeline.

use crate::error::ErrorKind;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Lifecycle of a single conversion job.
///
/// ```text
/// Received ─▶ Staged ─▶ Converted ─┬─▶ Protected ───┬─▶ Delivered
///                                  └─▶ Unprotected ─┘
///        (any non-terminal state) ──▶ Failed(kind)
/// ```
///
/// Observers receive `Failed` through
/// [`crate::progress::PipelineObserver::on_job_failed`], not as a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Received,
    Staged,
    Converted,
    Protected,
    Unprotected,
    Delivered,
    Failed(ErrorKind),
}

impl JobState {
    /// `Delivered` and `Failed` end a job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Delivered | JobState::Failed(_))
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Received => f.write_str("received"),
            JobState::Staged => f.write_str("staged"),
            JobState::Converted => f.write_str("converted"),
            JobState::Protected => f.write_str("protected"),
            JobState::Unprotected => f.write_str("unprotected"),
            JobState::Delivered => f.write_str("delivered"),
            JobState::Failed(kind) => write!(f, "failed ({})", kind.code()),
        }
    }
}

/// What a successful job hands back.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    /// Correlation id used in logs and observer events.
    pub job_id: String,
    /// Artifact name; use it with [`crate::artifacts::ArtifactStore::get`].
    pub filename: String,
    /// Location of the artifact on disk.
    pub path: PathBuf,
    /// Whether a password was applied.
    pub protected: bool,
    pub stats: JobStats,
}

/// Sizes and timings of one job.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStats {
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub convert_duration_ms: u64,
    /// `None` when no password was supplied.
    pub protect_duration_ms: Option<u64>,
    pub total_duration_ms: u64,
}

/// Returned by the upload-only operation.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    /// Name the document was stored under in the upload directory.
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
    /// Local time the file was written, ISO-8601.
    pub upload_time: String,
}
