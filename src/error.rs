//! Error types for the pdf2markup library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2MarkupError`] — **Fatal**: the conversion cannot proceed at all
//!   (bad input file, wrong password, unparseable segments, unwritable
//!   output). Returned as `Err(Pdf2MarkupError)` from the top-level
//!   `convert*` functions.
//!
//! * [`OcrError`] — **Non-fatal**: one table (or formula) could not be
//!   recognised. Stored inside [`crate::output::TableResult`] so the rest of
//!   the document still converts and callers can inspect what was skipped.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2markup library.
///
/// Per-table OCR failures use [`OcrError`] and are recorded in
/// [`crate::output::TableResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Pdf2MarkupError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Segment errors ────────────────────────────────────────────────────
    /// The layout-analysis payload could not be parsed.
    #[error("Invalid segment data: {detail}")]
    InvalidSegments { detail: String },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Building the zip archive failed.
    #[error("Failed to build archive '{filename}': {detail}")]
    ArchiveFailed { filename: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal OCR error for a single table or formula.
///
/// The pipeline logs it, records it on the affected
/// [`crate::output::TableResult`], and moves on to the next segment.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum OcrError {
    /// The request never produced an HTTP response (connect, TLS, body read).
    #[error("OCR request failed: {0}")]
    Http(String),

    /// The endpoint answered with a non-success status.
    #[error("OCR endpoint returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// The call exceeded the configured per-call timeout.
    #[error("OCR call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The response body did not have the expected chat-completion shape.
    #[error("Malformed OCR response: {0}")]
    MalformedResponse(String),

    /// The table crop could not be encoded for upload.
    #[error("Failed to encode table image: {0}")]
    Encode(String),

    /// A local engine (text lines or structure model) failed.
    #[error("Local OCR engine failed: {0}")]
    Engine(String),
}

/// A non-fatal translation failure for one content part. The part keeps its
/// source-language text.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Translation to {language} failed: {detail}")]
pub struct TranslationError {
    pub language: String,
    pub detail: String,
}

impl From<reqwest::Error> for OcrError {
    fn from(e: reqwest::Error) -> Self {
        OcrError::Http(e.to_string())
    }
}

impl From<image::ImageError> for OcrError {
    fn from(e: image::ImageError) -> Self {
        OcrError::Encode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_segments_display() {
        let e = Pdf2MarkupError::InvalidSegments {
            detail: "expected an array".into(),
        };
        assert!(e.to_string().contains("expected an array"));
    }

    #[test]
    fn archive_failed_display() {
        let e = Pdf2MarkupError::ArchiveFailed {
            filename: "report.md".into(),
            detail: "disk full".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("report.md"), "got: {msg}");
        assert!(msg.contains("disk full"), "got: {msg}");
    }

    #[test]
    fn api_error_display() {
        let e = OcrError::Api {
            status: 503,
            body: "overloaded".into(),
        };
        assert!(e.to_string().contains("503"));
        assert!(e.to_string().contains("overloaded"));
    }

    #[test]
    fn timeout_display() {
        let e = OcrError::Timeout { secs: 120 };
        assert!(e.to_string().contains("120s"));
    }

    #[test]
    fn translation_error_display() {
        let e = TranslationError {
            language: "French".into(),
            detail: "rate limited".into(),
        };
        assert_eq!(e.to_string(), "Translation to French failed: rate limited");
    }

    #[test]
    fn ocr_error_serialises() {
        let e = OcrError::Engine("model missing".into());
        let json = serde_json::to_string(&e).expect("serialise");
        assert!(json.contains("model missing"));
    }
}
