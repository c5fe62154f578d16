//! Pipeline Orchestrator: drive one upload to a delivered artifact.
//!
//! ```text
//! Received ─▶ Staged ─▶ Converted ─┬─▶ Protected ───┬─▶ Delivered
//!                                  └─▶ Unprotected ─┘
//! ```
//!
//! Every transition is a `?`-propagating step inside [`Pipeline::run`]. The
//! files each step creates are registered with a [`JobFiles`] guard owned by
//! the job, so a failure at any step (or the job future being dropped)
//! removes the job's intermediates without a dedicated cleanup branch.
//!
//! The converter and the protector work inside a per-job scratch directory
//! (see [`JobFiles::scratch_dir`]). Only the finished file is moved into the
//! artifact root, so an unprotected intermediate is never downloadable and a
//! failed job never touches a file another job delivered.

use crate::artifacts::{ArtifactReader, ArtifactStore};
use crate::config::ServiceConfig;
use crate::error::PipelineError;
use crate::output::{JobOutcome, JobState, JobStats, UploadReceipt};
use crate::pipeline::convert::{DocumentConverter, SofficeConverter};
use crate::pipeline::naming::{Stage, StorageNamer};
use crate::pipeline::protect::{DocumentProtector, PdfProtector};
use crate::pipeline::staging::{JobFiles, StagedFile, UploadedDocument};
use crate::progress::{NoopObserver, PipelineObserver};
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Name of the file written and removed by the start-up write probe.
const WRITE_PROBE: &str = ".doc2pdf-write-test";

/// Upload-time layout in [`UploadReceipt::upload_time`].
const UPLOAD_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// The conversion pipeline. Cheap to share behind an `Arc`; jobs run
/// concurrently without any cross-job locking.
pub struct Pipeline {
    config: ServiceConfig,
    namer: StorageNamer,
    converter: Arc<dyn DocumentConverter>,
    protector: Arc<dyn DocumentProtector>,
    store: ArtifactStore,
    observer: Arc<dyn PipelineObserver>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Build a pipeline with the `soffice` converter and the `lopdf`
    /// protector. Creates and write-probes both directories.
    pub fn new(config: ServiceConfig) -> Result<Self, PipelineError> {
        let converter = Arc::new(SofficeConverter::from_config(&config));
        Self::with_collaborators(config, converter, Arc::new(PdfProtector::new()))
    }

    /// Build a pipeline around caller-supplied collaborators.
    pub fn with_collaborators(
        config: ServiceConfig,
        converter: Arc<dyn DocumentConverter>,
        protector: Arc<dyn DocumentProtector>,
    ) -> Result<Self, PipelineError> {
        ensure_directories(&config)?;
        let observer = config
            .observer
            .clone()
            .unwrap_or_else(|| Arc::new(NoopObserver));
        Ok(Self {
            namer: StorageNamer::from_config(&config),
            store: ArtifactStore::new(&config.output_dir),
            config,
            converter,
            protector,
            observer,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run one conversion job.
    ///
    /// A non-empty `password` makes the job protect its output; `None` and
    /// `Some("")` both deliver the converter's output unmodified.
    ///
    /// # Errors
    /// Any failed transition ends the job. Its transient files are removed
    /// before the error is returned.
    pub async fn run(
        &self,
        upload: UploadedDocument,
        password: Option<&str>,
    ) -> Result<JobOutcome, PipelineError> {
        let job_id = uuid::Uuid::new_v4().to_string();
        let filename = upload.filename.clone().unwrap_or_default();
        let password = password.filter(|p| !p.is_empty());

        let span = info_span!(
            "job",
            job_id = %job_id,
            filename = %filename,
            protect = password.is_some()
        );
        self.observer.on_job_start(&job_id, &filename);
        self.transition(&job_id, JobState::Received);

        let result = self
            .run_job(&job_id, upload, password)
            .instrument(span.clone())
            .await;

        let _enter = span.enter();
        match &result {
            Ok(outcome) => {
                info!(
                    artifact = %outcome.filename,
                    total_ms = outcome.stats.total_duration_ms,
                    "Job delivered"
                );
                self.observer.on_job_complete(&job_id, &outcome.filename);
            }
            Err(e) => {
                warn!(kind = e.kind().code(), "Job failed: {}", e);
                self.observer.on_job_failed(&job_id, e.kind(), &e.to_string());
            }
        }
        result
    }

    async fn run_job(
        &self,
        job_id: &str,
        upload: UploadedDocument,
        password: Option<&str>,
    ) -> Result<JobOutcome, PipelineError> {
        let started = Instant::now();

        // ── Received → Staged ───────────────────────────────────────────
        let (filename, bytes) = self.validate(upload)?;
        let names = self
            .namer
            .names(&filename, chrono::Local::now().naive_local());
        let mut files = JobFiles::new(job_id);

        let input = StagedFile::for_stage(&names, Stage::Input, &self.config.upload_dir);
        files.write(&input, &bytes).await?;
        self.transition(job_id, JobState::Staged);

        // ── Staged → Converted ──────────────────────────────────────────
        let convert_start = Instant::now();
        let scratch = files.scratch_dir(&self.config.output_dir)?;
        let raw = self.converter.convert(&input.path, &scratch).await?;

        let temp = StagedFile::for_stage(&names, Stage::ConvertedTemp, &scratch);
        files.rename(&raw, &temp).await?;
        let convert_duration_ms = convert_start.elapsed().as_millis() as u64;
        debug!("Converted in {}ms", convert_duration_ms);
        self.transition(job_id, JobState::Converted);

        // ── Converted → Protected | Unprotected ─────────────────────────
        let fin = StagedFile::for_stage(&names, Stage::Final, &scratch);
        let protect_duration_ms = match password {
            Some(password) => {
                let protect_start = Instant::now();
                files.track(&fin);
                self.protector.protect(&temp.path, &fin.path, password).await?;
                self.transition(job_id, JobState::Protected);
                Some(protect_start.elapsed().as_millis() as u64)
            }
            None => {
                files.rename(&temp.path, &fin).await?;
                self.transition(job_id, JobState::Unprotected);
                None
            }
        };

        // ── → Delivered ─────────────────────────────────────────────────
        let artifact = self.store.put(&fin.name, &fin.path).await?;
        self.transition(job_id, JobState::Delivered);

        Ok(JobOutcome {
            job_id: job_id.to_string(),
            filename: artifact.name,
            path: artifact.path,
            protected: protect_duration_ms.is_some(),
            stats: JobStats {
                input_bytes: bytes.len() as u64,
                output_bytes: artifact.size,
                convert_duration_ms,
                protect_duration_ms,
                total_duration_ms: started.elapsed().as_millis() as u64,
            },
        })
    }

    /// Store an upload in the upload directory without converting it.
    ///
    /// The stored file is not a job intermediate and is never cleaned up.
    pub async fn upload(&self, upload: UploadedDocument) -> Result<UploadReceipt, PipelineError> {
        let (filename, bytes) = self.validate(upload)?;
        let now = chrono::Local::now();
        let name = self.namer.name(&filename, Stage::Input, now.naive_local());
        let input = StagedFile::new(Stage::Input, &self.config.upload_dir, name);

        if let Err(e) = tokio::fs::write(&input.path, &bytes).await {
            let _ = tokio::fs::remove_file(&input.path).await;
            return Err(PipelineError::io(&input.path, e));
        }
        info!(filename = %input.name, size = bytes.len(), "Upload stored");

        Ok(UploadReceipt {
            filename: input.name,
            size: bytes.len() as u64,
            upload_time: now.format(UPLOAD_TIME_FORMAT).to_string(),
        })
    }

    /// Run a job for a document already on local disk.
    pub async fn convert_file(
        &self,
        path: impl AsRef<Path>,
        password: Option<&str>,
    ) -> Result<JobOutcome, PipelineError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::io(path, e))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.run(UploadedDocument::new(filename, bytes), password)
            .await
    }

    /// Open a delivered artifact by name.
    pub async fn open_artifact(&self, name: &str) -> Result<ArtifactReader, PipelineError> {
        Ok(self.store.get(name).await?)
    }

    fn transition(&self, job_id: &str, state: JobState) {
        debug!(state = %state, "Job transition");
        self.observer.on_transition(job_id, state);
    }

    fn validate(&self, upload: UploadedDocument) -> Result<(String, Bytes), PipelineError> {
        let bytes = upload.bytes.ok_or(PipelineError::MissingFile)?;
        let filename = upload.filename.unwrap_or_default();
        if filename.trim().is_empty() {
            return Err(PipelineError::EmptyFilename);
        }
        if !has_extension(&filename, &self.config.accepted_extension) {
            return Err(PipelineError::UnsupportedExtension {
                filename,
                expected: self.config.accepted_extension.clone(),
            });
        }
        if bytes.len() > self.config.max_upload_bytes {
            return Err(PipelineError::TooLarge {
                size: bytes.len(),
                limit: self.config.max_upload_bytes,
            });
        }
        Ok((filename, bytes))
    }
}

/// Case-insensitive check of the final extension.
fn has_extension(filename: &str, expected: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((base, ext)) => !base.is_empty() && ext.eq_ignore_ascii_case(expected),
        None => false,
    }
}

/// Create both directories and confirm they are writable.
pub fn ensure_directories(config: &ServiceConfig) -> Result<(), PipelineError> {
    for dir in [&config.upload_dir, &config.output_dir] {
        std::fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
        let probe = dir.join(WRITE_PROBE);
        std::fs::write(&probe, b"ok").map_err(|e| PipelineError::io(&probe, e))?;
        std::fs::remove_file(&probe).map_err(|e| PipelineError::io(&probe, e))?;
        debug!("Directory {} is writable", dir.display());
    }
    Ok(())
}
