//! OCR Types
//!
//! Defines the shared result types produced by recognition engines.

use serde::Serialize;

/// Axis-aligned bounding box in pixel coordinates of the engine input
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest box enclosing a set of corner points
    pub fn enclosing(points: &[[f32; 2]]) -> Option<Self> {
        let first = points.first()?;
        let (mut x0, mut y0, mut x1, mut y1) = (first[0], first[1], first[0], first[1]);
        for p in &points[1..] {
            x0 = x0.min(p[0]);
            y0 = y0.min(p[1]);
            x1 = x1.max(p[0]);
            y1 = y1.max(p[1]);
        }
        Some(Self::new(x0, y0, x1 - x0, y1 - y0))
    }
}

/// A recognized token or text region
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRegion {
    pub text: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

/// Output of one engine invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResult {
    pub extracted_text: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Regions in reading order as returned by the engine
    pub regions: Vec<TextRegion>,
    pub engine_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EngineResult {
    /// Assemble a result from already filtered regions
    ///
    /// Text is the region texts joined with single spaces; confidence is the
    /// mean region confidence (0.0 when nothing survived filtering).
    pub fn from_regions(engine_id: &str, regions: Vec<TextRegion>) -> Self {
        let extracted_text = regions
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let confidence = if regions.is_empty() {
            0.0
        } else {
            regions.iter().map(|r| r.confidence).sum::<f64>() / regions.len() as f64
        };

        Self {
            extracted_text,
            confidence,
            regions,
            engine_id: engine_id.to_string(),
            error: None,
        }
    }

    /// Zero-confidence result carrying an engine failure
    pub fn failed(engine_id: &str, error: impl ToString) -> Self {
        Self {
            extracted_text: String::new(),
            confidence: 0.0,
            regions: Vec::new(),
            engine_id: engine_id.to_string(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_usable(&self) -> bool {
        self.error.is_none() && !self.extracted_text.is_empty()
    }
}

/// Engine error types
///
/// Never leaves an adapter: adapters convert these into
/// `EngineResult::failed`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("OCR engine not available: {0}")]
    NotAvailable(String),

    #[error("Failed to prepare engine input: {0}")]
    ImageError(String),

    #[error("OCR processing failed: {0}")]
    ProcessingError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Unexpected engine output: {0}")]
    InvalidOutput(String),
}
