//! Shared fixtures for the integration suites: an in-memory PDF and fake
//! converter/protector collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_doc2pdf::pipeline::convert::expected_output_path;
use edgequake_doc2pdf::{
    ConversionFailure, DocumentConverter, DocumentProtector, PdfProtector, Pipeline,
    ProtectionFailure, ServiceConfig, ServiceConfigBuilder,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A one-page PDF with `text` drawn on it.
pub fn sample_pdf(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Sorted file names in `dir`.
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ── Fake converters ──────────────────────────────────────────────────────

fn write_failure(e: std::io::Error) -> ConversionFailure {
    ConversionFailure::Launch {
        program: "fake".into(),
        detail: e.to_string(),
    }
}

/// Writes a fixed PDF where `soffice` would.
pub struct FixtureConverter {
    pub pdf: Vec<u8>,
}

impl FixtureConverter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pdf: sample_pdf("fixture document"),
        })
    }
}

#[async_trait]
impl DocumentConverter for FixtureConverter {
    async fn convert(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, ConversionFailure> {
        let out = expected_output_path(input, output_dir, "pdf");
        tokio::fs::write(&out, &self.pdf).await.map_err(write_failure)?;
        Ok(out)
    }
}

/// Exits non-zero with a diagnostic.
pub struct FailingConverter;

#[async_trait]
impl DocumentConverter for FailingConverter {
    async fn convert(&self, _input: &Path, _output_dir: &Path) -> Result<PathBuf, ConversionFailure> {
        Err(ConversionFailure::NonZeroExit {
            status: "exit status: 1".into(),
            diagnostics: "Error: source file could not be loaded".into(),
        })
    }
}

/// Leaves a partial output behind, then fails.
pub struct PartialOutputConverter;

#[async_trait]
impl DocumentConverter for PartialOutputConverter {
    async fn convert(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, ConversionFailure> {
        let out = expected_output_path(input, output_dir, "pdf");
        tokio::fs::write(&out, b"%PDF-1.5 trunc").await.map_err(write_failure)?;
        Err(ConversionFailure::NonZeroExit {
            status: "signal: 9".into(),
            diagnostics: "killed".into(),
        })
    }
}

/// Writes its output and then hangs.
pub struct HangingConverter;

#[async_trait]
impl DocumentConverter for HangingConverter {
    async fn convert(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, ConversionFailure> {
        let out = expected_output_path(input, output_dir, "pdf");
        tokio::fs::write(&out, sample_pdf("slow")).await.map_err(write_failure)?;
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(out)
    }
}

// ── Fake protectors ──────────────────────────────────────────────────────

/// Writes half a file to `output`, then fails.
pub struct BrokenProtector;

#[async_trait]
impl DocumentProtector for BrokenProtector {
    async fn protect(
        &self,
        _input: &Path,
        output: &Path,
        _password: &str,
    ) -> Result<(), ProtectionFailure> {
        let _ = tokio::fs::write(output, b"%PDF-1.5 half").await;
        Err(ProtectionFailure::Encryption("unsupported security handler".into()))
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

/// A pipeline rooted in a scratch directory.
pub struct Harness {
    pub root: TempDir,
    pub pipeline: Pipeline,
}

impl Harness {
    pub fn upload_dir(&self) -> PathBuf {
        self.root.path().join("uploads")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.path().join("output")
    }
}

pub fn harness_with(
    converter: Arc<dyn DocumentConverter>,
    protector: Arc<dyn DocumentProtector>,
    tweak: impl FnOnce(ServiceConfigBuilder) -> ServiceConfigBuilder,
) -> Harness {
    let root = tempfile::tempdir().unwrap();
    let builder = ServiceConfig::builder()
        .upload_dir(root.path().join("uploads"))
        .output_dir(root.path().join("output"));
    let config = tweak(builder).build().unwrap();
    let pipeline = Pipeline::with_collaborators(config, converter, protector).unwrap();
    Harness { root, pipeline }
}

/// Fixture converter + real lopdf protector + default config.
pub fn harness() -> Harness {
    harness_with(FixtureConverter::new(), Arc::new(PdfProtector::new()), |b| b)
}
