//! Document error types
//!
//! Errors raised while opening, reading or rasterizing a document. None of
//! these escape the extraction facade: they are folded into the
//! `DocumentExtraction` status or a page's `error` field.

use thiserror::Error;

/// Unified document error type
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Page index out of range
    #[error("Page not found: index {0}")]
    PageNotFound(usize),

    /// Failed to parse document
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to render a page
    #[error("Render error: {0}")]
    RenderError(String),

    /// MuPDF context error
    #[error("MuPDF context error: {0}")]
    ContextError(String),

    /// IO error (std::io::Error)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Text extraction error
    #[error("Text extraction error: {0}")]
    TextExtractionError(String),

    /// Image decode/encode error
    #[error("Image error: {0}")]
    ImageError(String),
}

/// Result type alias for document operations
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Alias for Result (used by the MuPDF wrapper)
pub type DocumentResult<T> = Result<T>;

impl From<mupdf::Error> for DocumentError {
    fn from(err: mupdf::Error) -> Self {
        DocumentError::ContextError(err.to_string())
    }
}

impl From<image::ImageError> for DocumentError {
    fn from(err: image::ImageError) -> Self {
        DocumentError::ImageError(err.to_string())
    }
}
