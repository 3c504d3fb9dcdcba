//! Source document text extraction.
//!
//! Turns a file on disk into the plain UTF-8 text the pipeline chunks.
//! PDFs go through `pdf-extract`; everything else must already be UTF-8
//! text. Extraction never panics; failures come back as [`ExtractError`].

use std::path::Path;

use thiserror::Error;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

/// Refuse to read source files larger than this.
const MAX_SOURCE_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("file too large: {0} bytes")]
    TooLarge(u64),

    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Guess a content type from the file extension.
///
/// Unknown extensions are treated as plain text and rejected later if the
/// bytes are not UTF-8.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => MIME_PDF,
        Some("md") | Some("markdown") => MIME_MARKDOWN,
        _ => MIME_TEXT,
    }
}

/// Read `path` and extract its text.
pub fn extract_file(path: &Path) -> Result<String, ExtractError> {
    let io_err = |source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    };

    let size = std::fs::metadata(path).map_err(io_err)?.len();
    if size > MAX_SOURCE_BYTES {
        return Err(ExtractError::TooLarge(size));
    }

    let bytes = std::fs::read(path).map_err(io_err)?;
    extract_text(&bytes, content_type_for(path))
}

/// Extract plain text from `bytes` of the given content type.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_TEXT | MIME_MARKDOWN => String::from_utf8(bytes.to_vec())
            .map_err(|_| ExtractError::UnsupportedContentType("binary data".to_string())),
        other => Err(ExtractError::UnsupportedContentType(other.to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}
