//! CLI binary for edgequake-doc2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServiceConfig` and either serves the HTTP API or runs one local job.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_doc2pdf::{
    server, ErrorKind, JobState, NameUniqueness, Pipeline, PipelineObserver, ServiceConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner whose message follows the job's state.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PipelineObserver for CliObserver {
    fn on_job_start(&self, _job_id: &str, filename: &str) {
        self.bar.set_message(format!("Reading {filename}…"));
    }

    fn on_transition(&self, _job_id: &str, state: JobState) {
        let (prefix, msg) = match state {
            JobState::Staged => ("Converting", "running converter…"),
            JobState::Converted => ("Finishing", "conversion done"),
            JobState::Protected => ("Finishing", "password applied"),
            JobState::Unprotected => ("Finishing", "no password requested"),
            _ => return,
        };
        self.bar.set_prefix(prefix);
        self.bar.set_message(msg);
    }

    fn on_job_complete(&self, _job_id: &str, artifact_name: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", green("✔"), bold(artifact_name));
    }

    fn on_job_failed(&self, _job_id: &str, kind: ErrorKind, message: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}  {}", red("✘"), red(kind.code()), dim(message));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on the default port
  doc2pdf serve

  # Bind elsewhere, keep files under /var/lib/doc2pdf
  doc2pdf --upload-dir /var/lib/doc2pdf/uploads --output-dir /var/lib/doc2pdf/output \
          serve --bind 127.0.0.1:8080

  # Convert one document locally
  doc2pdf convert report.docx

  # Convert and password-protect, printing the outcome as JSON
  doc2pdf convert report.docx --password secret123 --json

ENDPOINTS (serve):
  POST /api/upload               multipart 'file'
  POST /api/convert              multipart 'file' [+ 'password']
  GET  /api/download/{filename}  the converted PDF
  GET  /health                   liveness

ENVIRONMENT VARIABLES:
  DOC2PDF_UPLOAD_DIR         Upload directory
  DOC2PDF_OUTPUT_DIR         Output / artifact directory
  DOC2PDF_CONVERTER          Converter executable (default: soffice)
  DOC2PDF_CONVERTER_TIMEOUT  Kill the converter after N seconds
  DOC2PDF_BIND               Listen address for 'serve'
  RUST_LOG                   Overrides the log filter
"#;

/// Convert Word documents to (optionally password-protected) PDF.
#[derive(Parser, Debug)]
#[command(
    name = "doc2pdf",
    version,
    about = "Convert Word documents to (optionally password-protected) PDF",
    long_about = "Convert .docx documents to PDF with LibreOffice, optionally protecting \
the result with a password. Runs as an HTTP service or as a one-shot local command.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory uploaded documents are staged in.
    #[arg(long, global = true, env = "DOC2PDF_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Directory converted artifacts are stored in.
    #[arg(long, global = true, env = "DOC2PDF_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Converter executable.
    #[arg(long, global = true, env = "DOC2PDF_CONVERTER", default_value = "soffice")]
    converter: String,

    /// Kill the converter after this many seconds (default: wait forever).
    #[arg(long, global = true, env = "DOC2PDF_CONVERTER_TIMEOUT",
          value_parser = clap::value_parser!(u64).range(1..))]
    converter_timeout: Option<u64>,

    /// Name files `<base>_<timestamp>` without the random suffix.
    #[arg(long, global = true, env = "DOC2PDF_TIMESTAMP_ONLY_NAMES")]
    timestamp_only_names: bool,

    /// Upload size cap in MiB.
    #[arg(long, global = true, env = "DOC2PDF_MAX_UPLOAD_MB", default_value_t = 16,
          value_parser = clap::value_parser!(u64).range(1..=1024))]
    max_upload_mb: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOC2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOC2PDF_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Listen address.
        #[arg(long, env = "DOC2PDF_BIND", default_value = "0.0.0.0:5002")]
        bind: SocketAddr,
    },
    /// Convert one local document.
    Convert {
        /// Path to the .docx file.
        input: PathBuf,

        /// Protect the PDF with this password.
        #[arg(long, env = "DOC2PDF_PASSWORD")]
        password: Option<String>,

        /// Print the job outcome as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback a local conversion needs, so INFO
    // library logs are suppressed while it is shown.
    let show_progress = matches!(cli.command, Command::Convert { json: false, .. }) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let observer: Option<Arc<dyn PipelineObserver>> = if show_progress && !cli.verbose {
        Some(CliObserver::new() as Arc<dyn PipelineObserver>)
    } else {
        None
    };

    let config = build_config(&cli, observer)?;
    let pipeline = Pipeline::new(config).context("Failed to prepare storage directories")?;

    match cli.command {
        Command::Serve { bind } => {
            let app = server::router(Arc::new(pipeline));
            server::serve(bind, app)
                .await
                .with_context(|| format!("Server on {bind} failed"))?;
        }
        Command::Convert {
            ref input,
            ref password,
            json,
        } => {
            let outcome = pipeline
                .convert_file(input, password.as_deref())
                .await
                .with_context(|| format!("Conversion of {} failed", input.display()))?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?
                );
            } else {
                println!("{}", outcome.path.display());
                if !cli.quiet {
                    eprintln!(
                        "   {} → {}  {}ms{}",
                        dim(&format!("{} bytes", outcome.stats.input_bytes)),
                        dim(&format!("{} bytes", outcome.stats.output_bytes)),
                        outcome.stats.total_duration_ms,
                        if outcome.protected { "  (protected)" } else { "" },
                    );
                }
            }
        }
    }

    Ok(())
}

/// Map CLI args to `ServiceConfig`.
fn build_config(cli: &Cli, observer: Option<Arc<dyn PipelineObserver>>) -> Result<ServiceConfig> {
    let uniqueness = if cli.timestamp_only_names {
        NameUniqueness::Timestamp
    } else {
        NameUniqueness::TimestampAndToken
    };
    let max_upload_bytes = usize::try_from(cli.max_upload_mb * 1024 * 1024)
        .context("--max-upload-mb does not fit in memory on this platform")?;

    let mut builder = ServiceConfig::builder()
        .upload_dir(&cli.upload_dir)
        .output_dir(&cli.output_dir)
        .converter_program(&cli.converter)
        .converter_timeout_secs(cli.converter_timeout)
        .name_uniqueness(uniqueness)
        .max_upload_bytes(max_upload_bytes);

    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }

    builder.build().context("Invalid configuration")
}
