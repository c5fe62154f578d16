//! Pipeline stages for DOCX-to-PDF conversion.
//!
//! Each submodule owns one concern so the orchestrator in
//! [`crate::convert`] can be driven with fake collaborators in tests.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ staging ──▶ convert ──▶ protect? ──▶ artifact store
//! (bytes)    (input)     (soffice)   (lopdf)      (final name)
//! ```
//!
//! 1. [`naming`]: derive every stage's file name from the original name
//!    and the time the job was received
//! 2. [`staging`]: write the upload and track every file the job creates;
//!    the tracker removes transient files when it is dropped
//! 3. [`convert`]: run the external converter as a child process
//! 4. [`protect`]: encrypt the converted PDF in-process; runs in
//!    `spawn_blocking` because lopdf is synchronous

pub mod convert;
pub mod naming;
pub mod protect;
pub mod staging;
