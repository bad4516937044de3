//! MuPDF-backed page source

use crate::document::DocumentResult;
use crate::mupdf::{page_text, rasterize_page, SafeDocument};

use super::strategist::PageSource;

/// Pages of a PDF opened with MuPDF
#[derive(Debug)]
pub struct MuPdfPageSource {
    doc: SafeDocument,
}

impl MuPdfPageSource {
    /// Open PDF bytes
    pub fn open(bytes: Vec<u8>, id: impl Into<String>) -> DocumentResult<Self> {
        Ok(Self {
            doc: SafeDocument::from_bytes(bytes, id.into())?,
        })
    }

    pub fn id(&self) -> &str {
        self.doc.id()
    }
}

impl PageSource for MuPdfPageSource {
    fn page_count(&self) -> usize {
        self.doc.page_count()
    }

    fn direct_text(&self, index: usize) -> DocumentResult<String> {
        self.doc.with_page(index, page_text)
    }

    fn render_png(&self, index: usize, zoom: f32, max_pixels: u64) -> DocumentResult<Vec<u8>> {
        self.doc.with_page(index, |page| rasterize_page(page, zoom, max_pixels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_image_bytes() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        assert!(MuPdfPageSource::open(png.to_vec(), "scan.png").is_err());
    }
}
