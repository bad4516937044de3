//! Document model
//!
//! Input payloads (`RawDocument`, `MediaKind`) and the normalized output
//! shape (`DocumentExtraction`, `PageResult`) shared by the image and PDF
//! extraction paths.

mod error;
mod types;

pub use error::{DocumentError, DocumentResult, Result};
pub use types::{
    DocumentExtraction, ExtractionStatus, MediaKind, PageResult, PageStrategy, RawDocument,
};
