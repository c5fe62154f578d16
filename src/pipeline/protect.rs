//! Protector: apply password protection to a finished PDF.
//!
//! ## Why spawn_blocking?
//!
//! `lopdf` parses and serialises the whole object graph synchronously; a
//! large report can take long enough to stall a Tokio worker, so the work
//! runs on the blocking pool just like other CPU-bound document handling.
//!
//! ## Write discipline
//!
//! The protected document is written to a temp file inside the destination
//! directory and renamed over `output` only once fully flushed. A failure at
//! any point leaves `output` absent and the input untouched.

use crate::error::ProtectionFailure;
use async_trait::async_trait;
use lopdf::{Document, EncryptionState, EncryptionVersion, Object, Permissions, StringFormat};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// RC4 key length used for the standard security handler.
const KEY_LENGTH_BITS: usize = 128;

/// Capability the orchestrator needs from a protector.
#[async_trait]
pub trait DocumentProtector: Send + Sync {
    /// Write a password-protected copy of `input` to `output`.
    async fn protect(
        &self,
        input: &Path,
        output: &Path,
        password: &str,
    ) -> Result<(), ProtectionFailure>;
}

/// [`DocumentProtector`] backed by `lopdf`.
#[derive(Debug, Clone, Default)]
pub struct PdfProtector;

impl PdfProtector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentProtector for PdfProtector {
    async fn protect(
        &self,
        input: &Path,
        output: &Path,
        password: &str,
    ) -> Result<(), ProtectionFailure> {
        if password.is_empty() {
            return Err(ProtectionFailure::EmptyPassword);
        }
        let input = input.to_path_buf();
        let output = output.to_path_buf();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || protect_blocking(&input, &output, &password))
            .await
            .map_err(|e| ProtectionFailure::Encryption(format!("protect task panicked: {e}")))?
    }
}

/// Blocking implementation of [`PdfProtector::protect`].
fn protect_blocking(input: &Path, output: &Path, password: &str) -> Result<(), ProtectionFailure> {
    let mut document = Document::load(input).map_err(|e| ProtectionFailure::UnreadableInput {
        path: input.to_path_buf(),
        detail: e.to_string(),
    })?;

    let pages = document.get_pages();
    if pages.is_empty() {
        return Err(ProtectionFailure::NoPages {
            path: input.to_path_buf(),
        });
    }
    debug!("Copying {} pages from {}", pages.len(), input.display());

    ensure_file_id(&mut document);

    let state = EncryptionState::try_from(EncryptionVersion::V2 {
        document: &document,
        owner_password: password,
        user_password: password,
        key_length: KEY_LENGTH_BITS,
        permissions: Permissions::all(),
    })
    .map_err(|e| ProtectionFailure::Encryption(e.to_string()))?;

    document
        .encrypt(&state)
        .map_err(|e| ProtectionFailure::Encryption(e.to_string()))?;

    persist(&mut document, output)?;
    info!("Protected {} pages into {}", pages.len(), output.display());
    Ok(())
}

/// The standard security handler derives its key from the trailer `/ID`.
/// LibreOffice always writes one; other producers may not.
fn ensure_file_id(document: &mut Document) {
    if document.trailer.has(b"ID") {
        return;
    }
    let id = uuid::Uuid::new_v4().as_bytes().to_vec();
    document.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(id.clone(), StringFormat::Hexadecimal),
            Object::String(id, StringFormat::Hexadecimal),
        ]),
    );
}

/// Atomic write: temp file in the destination directory, then rename.
fn persist(document: &mut Document, output: &Path) -> Result<(), ProtectionFailure> {
    let write_failed = |detail: String| ProtectionFailure::WriteFailed {
        path: output.to_path_buf(),
        detail,
    };

    let dir = output
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".protect-")
        .suffix(".pdf.tmp")
        .tempfile_in(&dir)
        .map_err(|e| write_failed(e.to_string()))?;

    document
        .save_to(&mut tmp)
        .map_err(|e| write_failed(e.to_string()))?;
    tmp.flush().map_err(|e| write_failed(e.to_string()))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| write_failed(e.to_string()))?;

    tmp.persist(output)
        .map_err(|e| write_failed(e.error.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Stream};
    use tempfile::tempdir;

    fn sample_pdf(text: &str) -> Vec<u8> {
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

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[tokio::test]
    async fn protected_output_differs_and_is_encrypted() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        let original = sample_pdf("quarterly numbers");
        std::fs::write(&input, &original).unwrap();

        PdfProtector::new()
            .protect(&input, &output, "secret123")
            .await
            .unwrap();

        let protected = std::fs::read(&output).unwrap();
        assert_ne!(protected, original);
        assert!(contains(&protected, b"/Encrypt"));
        // the plain-text content stream must not survive encryption
        assert!(!contains(&protected, b"quarterly numbers"));
        // input untouched
        assert_eq!(std::fs::read(&input).unwrap(), original);
    }

    #[tokio::test]
    async fn output_opens_only_with_the_password() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        std::fs::write(&input, sample_pdf("quarterly numbers")).unwrap();

        PdfProtector::new()
            .protect(&input, &output, "secret123")
            .await
            .unwrap();

        let mut doc = Document::load(&output).unwrap();
        assert!(doc.is_encrypted());
        assert!(doc.authenticate_password("").is_err());
        assert!(doc.authenticate_password("wrong").is_err());
        assert!(doc.authenticate_password("secret123").is_ok());

        doc.decrypt("secret123").unwrap();
        let text = doc.extract_text(&[1]).unwrap();
        assert!(text.contains("quarterly numbers"), "got: {text:?}");
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        std::fs::write(&input, sample_pdf("x")).unwrap();

        PdfProtector::new().protect(&input, &output, "pw").await.unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["in.pdf", "out.pdf"]);
    }

    #[tokio::test]
    async fn unreadable_input_is_reported() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        std::fs::write(&input, b"this is not a pdf").unwrap();

        let err = PdfProtector::new()
            .protect(&input, &output, "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, ProtectionFailure::UnreadableInput { .. }));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn empty_password_is_refused() {
        let dir = tempdir().unwrap();
        let err = PdfProtector::new()
            .protect(&dir.path().join("a.pdf"), &dir.path().join("b.pdf"), "")
            .await
            .unwrap_err();
        assert!(matches!(err, ProtectionFailure::EmptyPassword));
    }

    #[test]
    fn file_id_is_added_once() {
        let mut doc = Document::load_mem(&sample_pdf("x")).unwrap();
        doc.trailer.remove(b"ID");
        ensure_file_id(&mut doc);
        let first = format!("{:?}", doc.trailer.get(b"ID").unwrap());
        ensure_file_id(&mut doc);
        assert_eq!(format!("{:?}", doc.trailer.get(b"ID").unwrap()), first);
    }
}
