//! Observer trait for per-job pipeline events.
//!
//! Inject an [`Arc<dyn PipelineObserver>`] via
//! [`crate::config::ServiceConfigBuilder::observer`] to receive events as a
//! job moves through its states.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc2pdf::{JobState, PipelineObserver, ServiceConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct TransitionCounter {
//!     seen: AtomicUsize,
//! }
//!
//! impl PipelineObserver for TransitionCounter {
//!     fn on_transition(&self, _job_id: &str, state: JobState) {
//!         self.seen.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("job is now {state}");
//!     }
//! }
//!
//! let counter = Arc::new(TransitionCounter { seen: AtomicUsize::new(0) });
//!
//! let config = ServiceConfig::builder()
//!     .observer(counter as Arc<dyn PipelineObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::ErrorKind;
use crate::output::JobState;
use std::sync::Arc;

/// Called by the pipeline orchestrator as a job changes state.
///
/// Jobs run concurrently, so every method may be called from several tasks
/// at once. All methods have default no-op implementations.
pub trait PipelineObserver: Send + Sync {
    /// Called once when a job is received, before any validation.
    fn on_job_start(&self, job_id: &str, filename: &str) {
        let _ = (job_id, filename);
    }

    /// Called with `Received` right after [`Self::on_job_start`], then on
    /// every later non-terminal transition and on `Delivered`. `Failed` is
    /// reported through [`Self::on_job_failed`] instead.
    fn on_transition(&self, job_id: &str, state: JobState) {
        let _ = (job_id, state);
    }

    /// Called once after the artifact has been registered.
    fn on_job_complete(&self, job_id: &str, artifact_name: &str) {
        let _ = (job_id, artifact_name);
    }

    /// Called once when the job reaches `Failed`, after cleanup ran.
    fn on_job_failed(&self, job_id: &str, kind: ErrorKind, message: &str) {
        let _ = (job_id, kind, message);
    }
}

/// Default observer: ignores every event.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// The type stored in [`crate::config::ServiceConfig`].
pub type Observer = Arc<dyn PipelineObserver>;
