//! Error types for the edgequake-doc2pdf library.
//!
//! Two layers of errors reflect two layers of responsibility:
//!
//! * Component failures ([`ConversionFailure`], [`ProtectionFailure`] and
//!   [`ArtifactError`]) are what a single collaborator reports about its
//!   own work. They carry the collaborator's diagnostic text verbatim.
//!
//! * [`PipelineError`] is what a conversion job reports to its caller. Every
//!   component failure is converted into one of these at the component
//!   boundary, and each variant maps onto exactly one [`ErrorKind`], which
//!   in turn maps onto one HTTP status in the service layer.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Missing, empty-named or wrong-type upload.
    InvalidInput,
    /// External converter exited non-zero or produced no output.
    ConversionError,
    /// The PDF library failed to protect the document.
    ProtectionError,
    /// Requested artifact does not exist.
    NotFound,
    /// Requested artifact name is not a bare file name.
    InvalidName,
    /// Unexpected I/O or configuration failure.
    Internal,
}

impl ErrorKind {
    /// Machine-readable code used in error response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::ConversionError => "CONVERSION_ERROR",
            ErrorKind::ProtectionError => "PROTECTION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidName => "INVALID_NAME",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

/// All errors returned by the pipeline and the artifact store.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The request carried no `file` part.
    #[error("No file provided")]
    MissingFile,

    /// The `file` part had an empty filename.
    #[error("No selected file")]
    EmptyFilename,

    /// The filename does not carry the accepted extension.
    #[error("Invalid file type '{filename}'. Only .{expected} files are supported")]
    UnsupportedExtension { filename: String, expected: String },

    /// The upload exceeds the configured size cap.
    #[error("File is {size} bytes; the maximum upload size is {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    /// The multipart body itself could not be read.
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    // ── Stage errors ──────────────────────────────────────────────────────
    /// The external converter failed.
    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionFailure),

    /// Password protection failed.
    #[error("Failed to encrypt PDF: {0}")]
    Protection(#[from] ProtectionFailure),

    // ── Artifact errors ───────────────────────────────────────────────────
    /// No artifact with that name exists.
    #[error("File not found: '{name}'")]
    NotFound { name: String },

    /// The requested name could address something outside the artifact directory.
    #[error("Invalid file name: '{name}'")]
    InvalidName { name: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A staging or artifact write/rename failed.
    #[error("I/O failure on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::MissingFile
            | PipelineError::EmptyFilename
            | PipelineError::UnsupportedExtension { .. }
            | PipelineError::TooLarge { .. }
            | PipelineError::MalformedUpload(_) => ErrorKind::InvalidInput,
            PipelineError::Conversion(_) => ErrorKind::ConversionError,
            PipelineError::Protection(_) => ErrorKind::ProtectionError,
            PipelineError::NotFound { .. } => ErrorKind::NotFound,
            PipelineError::InvalidName { .. } => ErrorKind::InvalidName,
            PipelineError::Io { .. }
            | PipelineError::InvalidConfig(_)
            | PipelineError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Failure reported by a [`crate::pipeline::convert::DocumentConverter`].
#[derive(Debug, Clone, Error)]
pub enum ConversionFailure {
    /// The converter program could not be started at all.
    #[error("could not launch '{program}': {detail}")]
    Launch { program: String, detail: String },

    /// The converter ran and exited unsuccessfully.
    #[error("converter exited with {status}: {diagnostics}")]
    NonZeroExit { status: String, diagnostics: String },

    /// The converter exited successfully but the expected file is absent.
    #[error("expected output '{expected}' was not produced: {diagnostics}")]
    MissingOutput {
        expected: PathBuf,
        diagnostics: String,
    },

    /// The optional converter timeout fired; the child was killed.
    #[error("converter did not finish within {secs}s")]
    TimedOut { secs: u64 },
}

impl ConversionFailure {
    /// The tool's diagnostic text, if it produced any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            ConversionFailure::NonZeroExit { diagnostics, .. }
            | ConversionFailure::MissingOutput { diagnostics, .. } => Some(diagnostics.as_str()),
            ConversionFailure::Launch { detail, .. } => Some(detail.as_str()),
            ConversionFailure::TimedOut { .. } => None,
        }
    }
}

/// Failure reported by a [`crate::pipeline::protect::DocumentProtector`].
#[derive(Debug, Clone, Error)]
pub enum ProtectionFailure {
    /// The input PDF could not be read or parsed.
    #[error("cannot read '{path}': {detail}")]
    UnreadableInput { path: PathBuf, detail: String },

    /// The input parsed but contains no pages.
    #[error("'{path}' contains no pages")]
    NoPages { path: PathBuf },

    /// The caller passed an empty password.
    #[error("refusing to protect with an empty password")]
    EmptyPassword,

    /// The PDF library rejected the encryption request.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The protected document could not be persisted.
    #[error("cannot write '{path}': {detail}")]
    WriteFailed { path: PathBuf, detail: String },
}

/// Failure reported by the [`crate::artifacts::ArtifactStore`].
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact '{0}' not found")]
    NotFound(String),

    #[error("artifact name '{0}' is not a bare file name")]
    InvalidName(String),

    #[error("artifact I/O on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<ArtifactError> for PipelineError {
    fn from(e: ArtifactError) -> Self {
        match e {
            ArtifactError::NotFound(name) => PipelineError::NotFound { name },
            ArtifactError::InvalidName(name) => PipelineError::InvalidName { name },
            ArtifactError::Io { path, source } => PipelineError::Io { path, source },
        }
    }
}
