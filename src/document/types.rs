//! Core document types
//!
//! Input payloads and the normalized extraction result shared by the image
//! and PDF paths.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::ocr::EngineResult;

/// Image MIME types the recognition path accepts
const SUPPORTED_IMAGE_MIMES: &[&str] = &["image/png", "image/jpeg", "image/bmp", "image/tiff"];

/// Media kind of an uploaded payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    /// Raster image (PNG, JPEG, BMP, TIFF)
    Image,
    /// PDF document
    Pdf,
    /// Anything else; carries the extension or MIME type that was seen
    Unsupported(String),
}

impl MediaKind {
    /// Classify from a MIME type
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        if mime == "application/pdf" {
            Self::Pdf
        } else if SUPPORTED_IMAGE_MIMES.contains(&mime.as_str()) {
            Self::Image
        } else {
            Self::Unsupported(mime)
        }
    }

    /// Classify from a filename extension
    pub fn from_filename(filename: &str) -> Self {
        match mime_guess::from_path(filename).first_raw() {
            Some(mime) => match Self::from_mime(mime) {
                Self::Unsupported(_) => Self::Unsupported(extension_label(filename)),
                kind => kind,
            },
            None => Self::Unsupported(extension_label(filename)),
        }
    }

    /// Classify from magic bytes
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF") {
            return Some(Self::Pdf);
        }

        match image::guess_format(bytes).ok()? {
            image::ImageFormat::Png
            | image::ImageFormat::Jpeg
            | image::ImageFormat::Bmp
            | image::ImageFormat::Tiff => Some(Self::Image),
            _ => None,
        }
    }

    /// Classify an upload: filename first, content sniffing second
    pub fn detect(filename: &str, bytes: &[u8]) -> Self {
        match Self::from_filename(filename) {
            Self::Unsupported(label) => Self::from_magic_bytes(bytes).unwrap_or(Self::Unsupported(label)),
            kind => kind,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Pdf => f.write_str("pdf"),
            Self::Unsupported(label) => f.write_str(label),
        }
    }
}

fn extension_label(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Raw upload handed to the extraction facade
///
/// Owned by the caller; the pipeline only ever borrows it.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
    pub kind: MediaKind,
    pub filename: String,
}

impl RawDocument {
    pub fn new(bytes: Vec<u8>, kind: MediaKind, filename: impl Into<String>) -> Self {
        Self {
            bytes,
            kind,
            filename: filename.into(),
        }
    }

    /// Build a document whose kind is detected from the filename and content
    pub fn detect(bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let kind = MediaKind::detect(&filename, &bytes);
        Self::new(bytes, kind, filename)
    }
}

/// How a page's final text was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageStrategy {
    /// Embedded PDF text accepted as-is
    #[serde(rename = "direct")]
    Direct,
    /// Raster input recognized by the engines
    #[serde(rename = "ocr")]
    Ocr,
    /// Embedded text was too short, the page was rasterized and recognized
    #[serde(rename = "ocr-fallback-after-direct-fail")]
    OcrFallback,
}

/// Per-page extraction detail
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    /// Page number (1-indexed)
    pub page_number: usize,
    pub direct_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
    pub final_text: String,
    pub confidence: f64,
    pub strategy_used: PageStrategy,
    /// Why the OCR path for this page did not complete
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Overall outcome of an extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionStatus {
    Ok,
    UnsupportedType,
    Unreadable,
}

/// Top-level extraction result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentExtraction {
    pub text: String,
    pub confidence: f64,
    pub pages: Vec<PageResult>,
    /// Winning engine (single-image extractions only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_engine: Option<String>,
    /// Every engine's raw result (single-image extractions only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_engine_results: Option<BTreeMap<String, EngineResult>>,
    pub status: ExtractionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentExtraction {
    /// Assemble a result from ordered pages
    ///
    /// Text is the newline-joined page texts, trimmed. Confidence is the
    /// mean of the non-zero page confidences, or 0.0 when there are none.
    pub fn from_pages(pages: Vec<PageResult>) -> Self {
        let text = pages
            .iter()
            .map(|p| p.final_text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        let scored: Vec<f64> = pages
            .iter()
            .map(|p| p.confidence)
            .filter(|c| *c > 0.0)
            .collect();
        let confidence = if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<f64>() / scored.len() as f64
        };

        Self {
            text,
            confidence,
            pages,
            best_engine: None,
            all_engine_results: None,
            status: ExtractionStatus::Ok,
            error: None,
        }
    }

    /// Empty result for a payload kind the pipeline does not handle
    pub fn unsupported(kind: &MediaKind) -> Self {
        Self::empty(
            ExtractionStatus::UnsupportedType,
            format!("Unsupported file type: {}", kind),
        )
    }

    /// Empty result for a payload that could not be decoded or opened
    pub fn unreadable(reason: impl Into<String>) -> Self {
        Self::empty(ExtractionStatus::Unreadable, reason.into())
    }

    fn empty(status: ExtractionStatus, error: String) -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            pages: Vec::new(),
            best_engine: None,
            all_engine_results: None,
            status,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ExtractionStatus::Ok
    }
}
