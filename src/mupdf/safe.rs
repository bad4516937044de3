//! Thread-safe document wrapper for MuPDF
//!
//! The wrapper stores the PDF bytes, validates them once on construction,
//! and opens a fresh `mupdf::Document` for each operation. Access is
//! serialized with `parking_lot::Mutex`.

use std::sync::Arc;

use mupdf::{Document, Page};
use parking_lot::Mutex;

use crate::document::{DocumentError, DocumentResult};

const PDF_MIME: &str = "application/pdf";

/// Thread-safe PDF document
pub struct SafeDocument {
    data: Arc<Vec<u8>>,
    /// Document identifier (used in logs)
    id: String,
    page_count: usize,
    lock: Mutex<()>,
}

impl SafeDocument {
    /// Validate and wrap PDF bytes
    pub fn from_bytes(data: Vec<u8>, id: String) -> DocumentResult<Self> {
        if !data.starts_with(b"%PDF") {
            return Err(DocumentError::UnsupportedFormat(
                "Missing %PDF header".to_string(),
            ));
        }

        let doc = Document::from_bytes(&data, PDF_MIME)?;
        let page_count = usize::try_from(doc.page_count()?)
            .map_err(|_| DocumentError::ParseError("Negative page count".to_string()))?;

        tracing::debug!("Opened PDF {} with {} pages", id, page_count);

        Ok(Self {
            data: Arc::new(data),
            id,
            page_count,
            lock: Mutex::new(()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Execute a closure with access to a freshly opened document
    pub fn with_doc<F, R>(&self, f: F) -> DocumentResult<R>
    where
        F: FnOnce(&Document) -> DocumentResult<R>,
    {
        let _guard = self.lock.lock();
        let doc = Document::from_bytes(&self.data, PDF_MIME)?;
        f(&doc)
    }

    /// Execute a closure with one loaded page (0-indexed)
    pub fn with_page<F, R>(&self, index: usize, f: F) -> DocumentResult<R>
    where
        F: FnOnce(&Page) -> DocumentResult<R>,
    {
        if index >= self.page_count {
            return Err(DocumentError::PageNotFound(index));
        }
        let page_number =
            i32::try_from(index).map_err(|_| DocumentError::PageNotFound(index))?;

        self.with_doc(|doc| {
            let page = doc.load_page(page_number)?;
            f(&page)
        })
    }
}

impl std::fmt::Debug for SafeDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeDocument")
            .field("id", &self.id)
            .field("page_count", &self.page_count)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_pdf_bytes() {
        let err = SafeDocument::from_bytes(b"\x89PNG\r\n\x1a\n".to_vec(), "scan".into()).unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_rejects_truncated_pdf() {
        let result = SafeDocument::from_bytes(b"%PDF-1.7\n".to_vec(), "broken".into());
        assert!(result.is_err());
    }
}
