//! Converter Adapter: run the external document converter.
//!
//! The converter is LibreOffice in headless mode. It is invoked as
//!
//! ```text
//! <program> [extra args…] --headless --convert-to <format> --outdir <dir> <input>
//! ```
//!
//! and writes `<dir>/<input stem>.<format>`. The adapter computes that path
//! up front and checks for it after the process exits; it never scans the
//! directory. Conversion correctness belongs to the tool: the adapter only
//! reports whether the tool succeeded and, if not, what it printed.

use crate::config::ServiceConfig;
use crate::error::ConversionFailure;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Capability the orchestrator needs from a converter.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert `input` into one file inside `output_dir` and return its path.
    async fn convert(&self, input: &Path, output_dir: &Path)
        -> Result<PathBuf, ConversionFailure>;
}

/// Where the converter will write its output for `input`.
pub fn expected_output_path(input: &Path, output_dir: &Path, format: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(format!("{stem}.{format}"))
}

/// [`DocumentConverter`] backed by the `soffice` command-line tool.
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    program: String,
    extra_args: Vec<String>,
    target_format: String,
    timeout: Option<Duration>,
}

impl SofficeConverter {
    pub fn new(program: impl Into<String>, target_format: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
            target_format: target_format.into(),
            timeout: None,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            program: config.converter_program.clone(),
            extra_args: config.converter_args.clone(),
            target_format: config.target_format.clone(),
            timeout: config.converter_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full argument list for one invocation.
    pub fn args_for(&self, input: &Path, output_dir: &Path) -> Vec<String> {
        let mut args = self.extra_args.clone();
        args.extend([
            "--headless".to_string(),
            "--convert-to".to_string(),
            self.target_format.clone(),
            "--outdir".to_string(),
            output_dir.to_string_lossy().to_string(),
            input.to_string_lossy().to_string(),
        ]);
        args
    }
}

#[async_trait]
impl DocumentConverter for SofficeConverter {
    #[tracing::instrument(skip(self), fields(program = %self.program))]
    async fn convert(
        &self,
        input: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf, ConversionFailure> {
        let expected = expected_output_path(input, output_dir, &self.target_format);
        let args = self.args_for(input, output_dir);
        info!("Running conversion command: {} {}", self.program, args.join(" "));

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ConversionFailure::Launch {
                program: self.program.clone(),
                detail: e.to_string(),
            })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    warn!("Converter exceeded {}s; killing it", limit.as_secs());
                    ConversionFailure::TimedOut {
                        secs: limit.as_secs(),
                    }
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| ConversionFailure::Launch {
            program: self.program.clone(),
            detail: e.to_string(),
        })?;

        let diagnostics = diagnostics(&output.stdout, &output.stderr);

        if !output.status.success() {
            warn!("Conversion failed: {}", diagnostics);
            return Err(ConversionFailure::NonZeroExit {
                status: output.status.to_string(),
                diagnostics,
            });
        }

        if !tokio::fs::try_exists(&expected).await.unwrap_or(false) {
            warn!("Output file not found at {}", expected.display());
            return Err(ConversionFailure::MissingOutput {
                expected,
                diagnostics,
            });
        }

        debug!("Converter wrote {}", expected.display());
        Ok(expected)
    }
}

/// Prefer stderr; LibreOffice reports some failures only on stdout.
fn diagnostics(stdout: &[u8], stderr: &[u8]) -> String {
    let err = String::from_utf8_lossy(stderr);
    if !err.trim().is_empty() {
        return err.trim().to_string();
    }
    String::from_utf8_lossy(stdout).trim().to_string()
}
