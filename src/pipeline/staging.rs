//! Staged files and the per-job cleanup guard.
//!
//! Every file a job writes is recorded in its [`JobFiles`] the moment it is
//! created, together with its [`Stage`]. When the guard is dropped, tracked
//! files whose stage is transient are removed, and so is the job's scratch
//! directory. Dropping happens on every exit path of the job future:
//! success, `?` early return, panic, or the caller dropping the future. The
//! orchestrator therefore never needs a hand-written cleanup branch per
//! failure.
//!
//! The scratch directory lives inside the artifact root under a dot-prefixed
//! name, so nothing staged in it is ever addressable as an artifact. Renames
//! out of it stay on one filesystem.

use crate::error::PipelineError;
use crate::pipeline::naming::{JobNames, Stage};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Prefix of the per-job scratch directory.
const SCRATCH_PREFIX: &str = ".job-";

/// Raw upload as it arrives from a request or from the CLI.
#[derive(Debug, Clone, Default)]
pub struct UploadedDocument {
    /// `None` when the request had no `file` part.
    pub bytes: Option<Bytes>,
    /// Filename declared by the client.
    pub filename: Option<String>,
    /// Declared content type; informational only.
    pub content_type: Option<String>,
}

impl UploadedDocument {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: Some(bytes.into()),
            filename: Some(filename.into()),
            content_type: None,
        }
    }
}

/// A file on local storage tagged with the stage that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub stage: Stage,
    pub name: String,
    pub path: PathBuf,
}

impl StagedFile {
    pub fn new(stage: Stage, dir: &Path, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            stage,
            path: dir.join(&name),
            name,
        }
    }

    /// The file `names` assigns to `stage`, placed in `dir`.
    pub fn for_stage(names: &JobNames, stage: Stage, dir: &Path) -> Self {
        Self::new(stage, dir, names.for_stage(stage))
    }
}

/// Tracks the files a job has created and removes the transient ones.
#[derive(Debug)]
pub struct JobFiles {
    job_id: String,
    tracked: Vec<StagedFile>,
    scratch: Option<TempDir>,
}

impl JobFiles {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            tracked: Vec::new(),
            scratch: None,
        }
    }

    /// Record a file the job is about to create (or has created).
    pub fn track(&mut self, file: &StagedFile) {
        if !self.tracked.iter().any(|t| t.path == file.path) {
            self.tracked.push(file.clone());
        }
    }

    pub fn tracked(&self) -> &[StagedFile] {
        &self.tracked
    }

    /// Create the job's private scratch directory under `parent`.
    ///
    /// The directory and everything in it is removed with the guard.
    pub fn scratch_dir(&mut self, parent: &Path) -> Result<PathBuf, PipelineError> {
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| PipelineError::io(parent, e))?;
        let path = dir.path().to_path_buf();
        debug!(job_id = %self.job_id, dir = %path.display(), "scratch directory created");
        self.scratch = Some(dir);
        Ok(path)
    }

    /// Write `bytes` to a new staged file and start tracking it.
    pub async fn write(&mut self, file: &StagedFile, bytes: &[u8]) -> Result<(), PipelineError> {
        self.track(file);
        tokio::fs::write(&file.path, bytes)
            .await
            .map_err(|e| PipelineError::io(&file.path, e))?;
        debug!(job_id = %self.job_id, stage = %file.stage, name = %file.name, "staged file written");
        Ok(())
    }

    /// Rename `from` to `to`, tracking the destination.
    pub async fn rename(&mut self, from: &Path, to: &StagedFile) -> Result<(), PipelineError> {
        self.track(to);
        tokio::fs::rename(from, &to.path)
            .await
            .map_err(|e| PipelineError::io(&to.path, e))?;
        debug!(job_id = %self.job_id, stage = %to.stage, name = %to.name, "staged file renamed");
        Ok(())
    }

    fn remove_transient(&mut self) {
        for file in self.tracked.drain(..) {
            if !file.stage.is_transient() {
                continue;
            }
            let path = &file.path;
            match std::fs::remove_file(path) {
                Ok(()) => debug!(
                    job_id = %self.job_id,
                    stage = %file.stage,
                    path = %path.display(),
                    "removed staged file"
                ),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    job_id = %self.job_id,
                    path = %path.display(),
                    error = %e,
                    "failed to remove staged file"
                ),
            }
        }
    }
}

impl Drop for JobFiles {
    fn drop(&mut self) {
        self.remove_transient();
        // `scratch` is dropped after this, taking its contents with it
    }
}
