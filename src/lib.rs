//! # edgequake-doc2pdf
//!
//! Convert Word (`.docx`) documents to PDF, optionally protected with a
//! password, as a library, an HTTP service or a one-shot CLI.
//!
//! ## Why an external converter?
//!
//! Laying out a Word document faithfully is a very large problem that
//! LibreOffice already solves. This crate treats `soffice --headless` as a
//! black box and concentrates on what surrounds it: safe file naming, staging,
//! cleanup of every intermediate on every exit path, in-process password
//! protection and retrieval of the finished artifact.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .docx upload
//!  │
//!  ├─ 1. Validate  file present, non-empty name, .docx, size cap
//!  ├─ 2. Stage     write <base>_<ts>[_<token>].docx to the upload dir
//!  ├─ 3. Convert   soffice --headless --convert-to pdf (child process)
//!  ├─ 4. Protect   lopdf RC4-128 when a password was supplied (spawn_blocking)
//!  └─ 5. Deliver   register <base>_<ts>[_<token>].pdf in the artifact store
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2pdf::{Pipeline, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Pipeline::new(ServiceConfig::default())?;
//!     let outcome = pipeline.convert_file("report.docx", Some("secret123")).await?;
//!     println!("{} ({} bytes)", outcome.path.display(), outcome.stats.output_bytes);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum router and `serve` in [`server`] |
//! | `cli`    | on      | Enables the `doc2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable both when embedding only the pipeline:
//! ```toml
//! edgequake-doc2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifacts;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifacts::{Artifact, ArtifactReader, ArtifactStore};
pub use config::{NameUniqueness, ServiceConfig, ServiceConfigBuilder};
pub use convert::{ensure_directories, Pipeline};
pub use error::{ArtifactError, ConversionFailure, ErrorKind, PipelineError, ProtectionFailure};
pub use output::{JobOutcome, JobState, JobStats, UploadReceipt};
pub use pipeline::convert::{DocumentConverter, SofficeConverter};
pub use pipeline::naming::{sanitize_filename, JobNames, Stage, StorageNamer};
pub use pipeline::protect::{DocumentProtector, PdfProtector};
pub use pipeline::staging::{StagedFile, UploadedDocument};
pub use progress::{NoopObserver, Observer, PipelineObserver};
