//! Configuration for the conversion service.
//!
//! Every component receives what it needs from [`ServiceConfig`] at
//! construction time; nothing reads directories or tool paths from ambient
//! globals. Build it with [`ServiceConfig::builder()`] or start from
//! [`ServiceConfig::default()`].

use crate::error::PipelineError;
use crate::progress::{Observer, PipelineObserver};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for the conversion pipeline and the artifact store.
///
/// # Example
/// ```rust
/// use edgequake_doc2pdf::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .upload_dir("/var/lib/doc2pdf/uploads")
///     .output_dir("/var/lib/doc2pdf/output")
///     .converter_program("/usr/bin/soffice")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Where uploaded documents are staged. Default: `./uploads`.
    pub upload_dir: PathBuf,

    /// Where final artifacts live; the artifact store is rooted here. Each
    /// job also stages its converter output in a hidden `.job-*` directory
    /// under it. Default: `./output`.
    pub output_dir: PathBuf,

    /// External converter executable. Default: `soffice`.
    pub converter_program: String,

    /// Extra arguments placed before the conversion flags, e.g.
    /// `-env:UserInstallation=file:///tmp/lo-profile`. Default: none.
    pub converter_args: Vec<String>,

    /// Target format passed to `--convert-to`. Default: `pdf`.
    pub target_format: String,

    /// The one accepted upload extension, without the dot. Default: `docx`.
    pub accepted_extension: String,

    /// Upload size cap in bytes. Default: 16 MiB.
    pub max_upload_bytes: usize,

    /// Kill the converter after this many seconds. Default: `None` (wait
    /// indefinitely).
    pub converter_timeout_secs: Option<u64>,

    /// How staged file names are disambiguated. Default:
    /// [`NameUniqueness::TimestampAndToken`].
    pub name_uniqueness: NameUniqueness,

    /// Optional job event observer.
    pub observer: Option<Observer>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("output"),
            converter_program: "soffice".to_string(),
            converter_args: Vec::new(),
            target_format: "pdf".to_string(),
            accepted_extension: "docx".to_string(),
            max_upload_bytes: 16 * 1024 * 1024,
            converter_timeout_secs: None,
            name_uniqueness: NameUniqueness::default(),
            observer: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("upload_dir", &self.upload_dir)
            .field("output_dir", &self.output_dir)
            .field("converter_program", &self.converter_program)
            .field("converter_args", &self.converter_args)
            .field("target_format", &self.target_format)
            .field("accepted_extension", &self.accepted_extension)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("converter_timeout_secs", &self.converter_timeout_secs)
            .field("name_uniqueness", &self.name_uniqueness)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn PipelineObserver>"))
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn converter_program(mut self, program: impl Into<String>) -> Self {
        self.config.converter_program = program.into();
        self
    }

    pub fn converter_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.converter_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn target_format(mut self, format: impl Into<String>) -> Self {
        self.config.target_format = format.into();
        self
    }

    /// Leading dots are stripped and the extension is lower-cased.
    pub fn accepted_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.accepted_extension = ext.into().trim_start_matches('.').to_lowercase();
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn converter_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.converter_timeout_secs = secs;
        self
    }

    pub fn name_uniqueness(mut self, mode: NameUniqueness) -> Self {
        self.config.name_uniqueness = mode;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, PipelineError> {
        let c = &self.config;
        if c.converter_program.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "converter program must not be empty".into(),
            ));
        }
        if c.accepted_extension.is_empty() || c.target_format.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "accepted extension and target format must not be empty".into(),
            ));
        }
        if c.accepted_extension.eq_ignore_ascii_case(&c.target_format) {
            return Err(PipelineError::InvalidConfig(format!(
                "accepted extension and target format are both '{}'",
                c.target_format
            )));
        }
        if c.max_upload_bytes == 0 {
            return Err(PipelineError::InvalidConfig(
                "max upload size must be ≥ 1 byte".into(),
            ));
        }
        if c.converter_timeout_secs == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "converter timeout must be ≥ 1s when set".into(),
            ));
        }
        if c.upload_dir == c.output_dir {
            return Err(PipelineError::InvalidConfig(
                "upload and output directories must differ".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the Storage Namer keeps concurrent jobs apart.
///
/// | Mode | Example final name |
/// |------|--------------------|
/// | `Timestamp` | `report_20241016_142501.pdf` |
/// | `TimestampAndToken` | `report_20241016_142501_9f2c41d0.pdf` |
///
/// `Timestamp` reproduces the legacy names exactly but two jobs for the same
/// base name within one wall-clock second get the same names and the later
/// one overwrites the earlier artifact. A job that fails never removes an
/// artifact another job delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NameUniqueness {
    /// Base name + second-resolution timestamp only.
    Timestamp,
    /// Base name + timestamp + 8 random hex digits. (default)
    #[default]
    TimestampAndToken,
}
