//! Neural (region-aware) engine adapter
//!
//! Wraps a multilingual detector/recognizer that returns text regions with
//! their own confidence and geometry. The default backend is a recognition
//! service reached over HTTP (an EasyOCR-style `readtext` endpoint).

use std::io::Cursor;
use std::time::Duration;

use base64::Engine as _;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use super::engine::{EngineAdapter, EngineHandle};
use super::types::{BoundingBox, EngineError, EngineResult, TextRegion};
use crate::preprocess::PreprocessedImage;

/// Default engine identifier
pub const NEURAL_ENGINE_ID: &str = "easyocr";

/// Regions at or below this confidence are dropped
pub const DEFAULT_MIN_REGION_CONFIDENCE: f64 = 0.30;

/// Backend returning text regions in reading order
pub trait RegionEngine: Send {
    fn recognize_regions(&mut self, image: &DynamicImage) -> Result<Vec<TextRegion>, EngineError>;
}

/// Variant B: region-aware multilingual recognition
pub struct NeuralAdapter {
    id: String,
    min_confidence: f64,
    handle: EngineHandle<Box<dyn RegionEngine>>,
}

impl NeuralAdapter {
    pub fn new(id: impl Into<String>, min_confidence: f64, handle: EngineHandle<Box<dyn RegionEngine>>) -> Self {
        Self {
            id: id.into(),
            min_confidence,
            handle,
        }
    }

    /// Adapter over an already constructed backend
    pub fn with_engine(id: impl Into<String>, min_confidence: f64, engine: impl RegionEngine + 'static) -> Self {
        let id = id.into();
        let handle = EngineHandle::ready(id.clone(), Box::new(engine) as Box<dyn RegionEngine>);
        Self::new(id, min_confidence, handle)
    }

    /// Recognition-service adapter, connected on first use
    pub fn region_service(config: RegionServiceConfig, min_confidence: f64) -> Self {
        let handle = EngineHandle::lazy(NEURAL_ENGINE_ID, move || {
            RegionServiceClient::connect(&config).map(|client| Box::new(client) as Box<dyn RegionEngine>)
        });
        Self::new(NEURAL_ENGINE_ID, min_confidence, handle)
    }
}

impl EngineAdapter for NeuralAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_available(&self) -> bool {
        self.handle.is_available()
    }

    fn extract(&self, image: &PreprocessedImage) -> EngineResult {
        match self.handle.with(|engine| engine.recognize_regions(&image.image)) {
            Ok(regions) => {
                let total = regions.len();
                let kept = keep_confident_regions(regions, self.min_confidence);
                tracing::debug!("{} kept {} of {} regions", self.id, kept.len(), total);
                EngineResult::from_regions(&self.id, kept)
            }
            Err(e) => {
                tracing::warn!("{} extraction failed: {}", self.id, e);
                EngineResult::failed(&self.id, e)
            }
        }
    }
}

/// Drop empty regions and regions not above the confidence floor,
/// preserving the engine's order
fn keep_confident_regions(regions: Vec<TextRegion>, min_confidence: f64) -> Vec<TextRegion> {
    regions
        .into_iter()
        .filter(|r| !r.text.trim().is_empty() && r.confidence > min_confidence)
        .map(|r| TextRegion {
            text: r.text.trim().to_string(),
            ..r
        })
        .collect()
}

/// Recognition service configuration
#[derive(Debug, Clone)]
pub struct RegionServiceConfig {
    /// Base URL, e.g. `http://localhost:8090`
    pub url: String,
    /// Language codes passed to the service
    pub languages: Vec<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for RegionServiceConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8090".to_string(),
            languages: vec!["en".to_string(), "hi".to_string()],
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct ReadTextRequest<'a> {
    image: String,
    languages: &'a [String],
    paragraph: bool,
}

#[derive(Debug, Deserialize)]
struct ReadTextResponse {
    #[serde(default)]
    results: Vec<ServiceRegion>,
}

#[derive(Debug, Deserialize)]
struct ServiceRegion {
    /// Corner points of the detected quadrilateral
    #[serde(default)]
    bbox: Vec<[f32; 2]>,
    text: String,
    confidence: f64,
}

impl From<ServiceRegion> for TextRegion {
    fn from(region: ServiceRegion) -> Self {
        TextRegion {
            bounding_box: BoundingBox::enclosing(&region.bbox)
                .unwrap_or_else(|| BoundingBox::new(0.0, 0.0, 0.0, 0.0)),
            text: region.text,
            confidence: region.confidence.clamp(0.0, 1.0),
        }
    }
}

/// HTTP client for the recognition service
pub struct RegionServiceClient {
    client: reqwest::blocking::Client,
    url: String,
    languages: Vec<String>,
}

impl RegionServiceClient {
    /// Build the client and check the service answers its health probe
    pub fn connect(config: &RegionServiceConfig) -> Result<Self, EngineError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::NotAvailable(format!("Failed to build HTTP client: {}", e)))?;

        let base = config.url.trim_end_matches('/').to_string();
        let health = format!("{}/health", base);
        let response = client
            .get(&health)
            .send()
            .map_err(|e| EngineError::NotAvailable(format!("Recognition service unreachable at {}: {}", base, e)))?;

        if !response.status().is_success() {
            return Err(EngineError::NotAvailable(format!(
                "Recognition service health check returned {}",
                response.status()
            )));
        }

        Ok(Self {
            client,
            url: base,
            languages: config.languages.clone(),
        })
    }
}

impl RegionEngine for RegionServiceClient {
    fn recognize_regions(&mut self, image: &DynamicImage) -> Result<Vec<TextRegion>, EngineError> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| EngineError::ImageError(e.to_string()))?;

        let request = ReadTextRequest {
            image: base64::engine::general_purpose::STANDARD.encode(&png),
            languages: &self.languages,
            paragraph: true,
        };

        let response = self
            .client
            .post(format!("{}/readtext", self.url))
            .json(&request)
            .send()
            .map_err(|e| EngineError::ApiError(format!("Failed to call recognition service: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(EngineError::ApiError(format!(
                "Recognition service returned {}: {}",
                status, body
            )));
        }

        let body = response
            .text()
            .map_err(|e| EngineError::ApiError(format!("Failed to read response: {}", e)))?;
        parse_readtext(&body)
    }
}

/// Parse a `readtext` response body into regions, in service order
pub fn parse_readtext(body: &str) -> Result<Vec<TextRegion>, EngineError> {
    let parsed: ReadTextResponse =
        serde_json::from_str(body).map_err(|e| EngineError::InvalidOutput(e.to_string()))?;
    Ok(parsed.results.into_iter().map(TextRegion::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::ImageSource;
    use image::GrayImage;

    const BILINGUAL_RESPONSE: &str = r#"{
        "results": [
            {"bbox": [[12, 8], [210, 8], [210, 40], [12, 40]], "text": "भारत सरकार", "confidence": 0.91},
            {"bbox": [[12, 50], [180, 50], [180, 80], [12, 80]], "text": "Government of India", "confidence": 0.87},
            {"bbox": [[12, 90], [40, 90], [40, 110], [12, 110]], "text": "ॐ", "confidence": 0.12},
            {"bbox": [[50, 90], [60, 90], [60, 110], [50, 110]], "text": "  ", "confidence": 0.99}
        ]
    }"#;

    struct FixedRegions(Vec<TextRegion>);

    impl RegionEngine for FixedRegions {
        fn recognize_regions(&mut self, _image: &DynamicImage) -> Result<Vec<TextRegion>, EngineError> {
            Ok(self.0.clone())
        }
    }

    struct ModelNotLoaded;

    impl RegionEngine for ModelNotLoaded {
        fn recognize_regions(&mut self, _image: &DynamicImage) -> Result<Vec<TextRegion>, EngineError> {
            Err(EngineError::ApiError("Recognition service returned 503".to_string()))
        }
    }

    fn page() -> PreprocessedImage {
        PreprocessedImage::unprocessed(
            DynamicImage::ImageLuma8(GrayImage::new(4, 4)),
            ImageSource::PdfPage { page_number: 1 },
        )
    }

    #[test]
    fn test_parse_readtext() {
        let regions = parse_readtext(BILINGUAL_RESPONSE).unwrap();

        assert_eq!(regions.len(), 4);
        assert_eq!(regions[0].text, "भारत सरकार");
        assert_eq!(regions[0].bounding_box, BoundingBox::new(12.0, 8.0, 198.0, 32.0));
        assert!((regions[1].confidence - 0.87).abs() < 1e-12);
    }

    #[test]
    fn test_parse_readtext_rejects_malformed_body() {
        assert!(matches!(
            parse_readtext("<html>bad gateway</html>"),
            Err(EngineError::InvalidOutput(_))
        ));
        assert!(parse_readtext("{}").unwrap().is_empty());
    }

    #[test]
    fn test_low_confidence_regions_dropped_in_order() {
        let regions = parse_readtext(BILINGUAL_RESPONSE).unwrap();
        let adapter = NeuralAdapter::with_engine("easyocr", DEFAULT_MIN_REGION_CONFIDENCE, FixedRegions(regions));

        let result = adapter.extract(&page());

        assert_eq!(result.extracted_text, "भारत सरकार Government of India");
        assert_eq!(result.regions.len(), 2);
        assert!((result.confidence - (0.91 + 0.87) / 2.0).abs() < 1e-12);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_region_at_threshold_is_dropped() {
        let region = |text: &str, confidence: f64| TextRegion {
            text: text.to_string(),
            confidence,
            bounding_box: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
        };
        let kept = keep_confident_regions(vec![region("a", 0.30), region("b", 0.300001)], 0.30);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "b");
    }

    #[test]
    fn test_service_failure_becomes_error_result() {
        let adapter = NeuralAdapter::with_engine("easyocr", 0.30, ModelNotLoaded);
        let result = adapter.extract(&page());

        assert_eq!(result.extracted_text, "");
        assert_eq!(result.confidence, 0.0);
        assert!(result.error.unwrap().contains("503"));
    }

    #[test]
    fn test_unreachable_service_is_unavailable() {
        let config = RegionServiceConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_millis(500),
            ..RegionServiceConfig::default()
        };
        let adapter = NeuralAdapter::region_service(config, 0.30);

        assert!(!adapter.is_available());
        assert!(adapter.extract(&page()).error.is_some());
    }

    #[test]
    fn test_extract_is_idempotent() {
        let regions = parse_readtext(BILINGUAL_RESPONSE).unwrap();
        let adapter = NeuralAdapter::with_engine("easyocr", 0.30, FixedRegions(regions));
        let page = page();

        assert_eq!(adapter.extract(&page), adapter.extract(&page));
    }
}
