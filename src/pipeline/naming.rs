//! Storage Namer: unique, sortable file names for each pipeline stage.
//!
//! A job's names share one *stem* built from the sanitized original base name
//! and the wall-clock second the job was received:
//!
//! ```text
//! "Quarterly Report.docx" @ 2024-10-16 14:25:01
//!   stem            Quarterly_Report_20241016_142501[_9f2c41d0]
//!   input           <stem>.docx
//!   converted-temp  <stem>_temp.pdf
//!   final           <stem>.pdf
//! ```
//!
//! The bracketed token only appears in
//! [`NameUniqueness::TimestampAndToken`] mode.

use crate::config::{NameUniqueness, ServiceConfig};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Timestamp layout shared by every stage name.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Used when sanitizing leaves nothing behind.
const FALLBACK_BASE: &str = "document";

static RE_UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.\-]").unwrap());
static RE_DOT_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{2,}").unwrap());

/// Pipeline stage a staged file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// The uploaded document as received.
    Input,
    /// Raw converter output, renamed out of the converter's way.
    ConvertedTemp,
    /// The deliverable.
    Final,
}

impl Stage {
    /// `input` and `converted-temp` files never outlive their job.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Stage::Final)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Input => "input",
            Stage::ConvertedTemp => "converted-temp",
            Stage::Final => "final",
        })
    }
}

/// All names one job will use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNames {
    pub stem: String,
    pub input: String,
    pub converted_temp: String,
    pub final_name: String,
}

impl JobNames {
    pub fn for_stage(&self, stage: Stage) -> &str {
        match stage {
            Stage::Input => &self.input,
            Stage::ConvertedTemp => &self.converted_temp,
            Stage::Final => &self.final_name,
        }
    }
}

/// Generates stage names from an original filename and a timestamp.
#[derive(Debug, Clone)]
pub struct StorageNamer {
    uniqueness: NameUniqueness,
    input_ext: String,
    output_ext: String,
}

impl StorageNamer {
    pub fn new(uniqueness: NameUniqueness, input_ext: &str, output_ext: &str) -> Self {
        Self {
            uniqueness,
            input_ext: input_ext.to_lowercase(),
            output_ext: output_ext.to_lowercase(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.name_uniqueness,
            &config.accepted_extension,
            &config.target_format,
        )
    }

    /// Build every stage name for a job received at `at`.
    ///
    /// Never fails: unusable filenames fall back to `document`.
    pub fn names(&self, original_filename: &str, at: NaiveDateTime) -> JobNames {
        let stem = self.stem(original_filename, at);
        JobNames {
            input: format!("{stem}.{}", self.input_ext),
            converted_temp: format!("{stem}_temp.{}", self.output_ext),
            final_name: format!("{stem}.{}", self.output_ext),
            stem,
        }
    }

    /// Name for a single stage. In token mode each call draws a new token, so
    /// use [`StorageNamer::names`] when several stages must agree.
    pub fn name(&self, original_filename: &str, stage: Stage, at: NaiveDateTime) -> String {
        self.names(original_filename, at).for_stage(stage).to_string()
    }

    fn stem(&self, original_filename: &str, at: NaiveDateTime) -> String {
        let base = base_name(original_filename);
        let ts = at.format(TIMESTAMP_FORMAT);
        match self.uniqueness {
            NameUniqueness::Timestamp => format!("{base}_{ts}"),
            NameUniqueness::TimestampAndToken => {
                let token = uuid::Uuid::new_v4().simple().to_string();
                format!("{base}_{ts}_{}", &token[..8])
            }
        }
    }
}

/// Make `filename` safe to use as a bare directory entry.
///
/// Path separators become spaces, whitespace runs collapse into `_`,
/// anything outside `[A-Za-z0-9_.-]` is dropped, runs of dots shrink to one
/// and leading/trailing `.`/`_` are trimmed. The result may be empty.
pub fn sanitize_filename(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    let kept = RE_UNSAFE_CHARS.replace_all(&joined, "");
    RE_DOT_RUNS
        .replace_all(&kept, ".")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Sanitized filename without its final extension.
fn base_name(original_filename: &str) -> String {
    let safe = sanitize_filename(original_filename);
    let stem = match safe.rfind('.') {
        Some(idx) if idx > 0 => &safe[..idx],
        _ => safe.as_str(),
    };
    let stem = stem.trim_matches(|c| c == '.' || c == '_');
    if stem.is_empty() {
        FALLBACK_BASE.to_string()
    } else {
        stem.to_string()
    }
}
