//! The set of engines consulted for every image

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use serde::Serialize;

use super::classical::ClassicalAdapter;
use super::engine::EngineAdapter;
use super::neural::NeuralAdapter;
use super::types::EngineResult;
use crate::config::OcrConfig;
use crate::preprocess::PreprocessedImage;

/// Availability of one engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub id: String,
    pub available: bool,
}

/// Ordered, read-only collection of engine adapters
///
/// Cheap to clone; clones share the same adapters and therefore the same
/// engine handles.
#[derive(Clone)]
pub struct EngineRegistry {
    engines: Arc<Vec<Arc<dyn EngineAdapter>>>,
}

impl EngineRegistry {
    /// Build a registry; engines are invoked in the given order
    pub fn new(engines: Vec<Arc<dyn EngineAdapter>>) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(engines.len());
        for engine in engines {
            if seen.insert(engine.id().to_string()) {
                unique.push(engine);
            } else {
                tracing::warn!("Duplicate OCR engine id {}, ignoring", engine.id());
            }
        }
        Self {
            engines: Arc::new(unique),
        }
    }

    /// Default engine set: the region-aware engine first, then Tesseract
    pub fn from_config(config: &OcrConfig) -> Self {
        let neural = NeuralAdapter::region_service(config.region_service.clone(), config.min_region_confidence);
        let classical = ClassicalAdapter::tesseract(config.tesseract.clone(), config.min_token_confidence);
        let engines: Vec<Arc<dyn EngineAdapter>> = vec![Arc::new(neural), Arc::new(classical)];
        Self::new(engines)
    }

    /// Process-wide default registry built from the environment
    ///
    /// The extraction facade never uses this implicitly; callers that want
    /// it pass it in.
    pub fn global() -> &'static EngineRegistry {
        static GLOBAL: OnceLock<EngineRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let config = OcrConfig::from_env().unwrap_or_else(|e| {
                tracing::warn!("Invalid OCR configuration ({}), using defaults", e);
                OcrConfig::default()
            });
            EngineRegistry::from_config(&config)
        })
    }

    pub fn engines(&self) -> &[Arc<dyn EngineAdapter>] {
        &self.engines
    }

    pub fn ids(&self) -> Vec<&str> {
        self.engines.iter().map(|e| e.id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Run every engine on the image, in invocation order
    pub fn extract_all(&self, image: &PreprocessedImage) -> Vec<EngineResult> {
        self.engines
            .iter()
            .map(|engine| {
                let result = engine.extract(image);
                tracing::debug!(
                    "Engine {} returned {} chars at confidence {:.3}",
                    engine.id(),
                    result.extracted_text.chars().count(),
                    result.confidence
                );
                result
            })
            .collect()
    }

    /// Availability of every engine (initializes handles on first call)
    pub fn statuses(&self) -> Vec<EngineStatus> {
        self.engines
            .iter()
            .map(|engine| EngineStatus {
                id: engine.id().to_string(),
                available: engine.is_available(),
            })
            .collect()
    }

    pub fn any_available(&self) -> bool {
        self.engines.iter().any(|e| e.is_available())
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry").field("engines", &self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::ImageSource;
    use image::{DynamicImage, GrayImage};

    struct Fixed {
        id: &'static str,
        text: &'static str,
        available: bool,
    }

    impl EngineAdapter for Fixed {
        fn id(&self) -> &str {
            self.id
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn extract(&self, _image: &PreprocessedImage) -> EngineResult {
            if self.available {
                EngineResult {
                    extracted_text: self.text.to_string(),
                    confidence: 0.8,
                    regions: Vec::new(),
                    engine_id: self.id.to_string(),
                    error: None,
                }
            } else {
                EngineResult::failed(self.id, "not installed")
            }
        }
    }

    fn fixed(id: &'static str, text: &'static str, available: bool) -> Arc<dyn EngineAdapter> {
        Arc::new(Fixed { id, text, available })
    }

    fn image() -> PreprocessedImage {
        PreprocessedImage::unprocessed(
            DynamicImage::ImageLuma8(GrayImage::new(2, 2)),
            ImageSource::Upload {
                filename: "scan.png".into(),
            },
        )
    }

    #[test]
    fn test_extract_all_keeps_invocation_order() {
        let registry = EngineRegistry::new(vec![fixed("easyocr", "first", true), fixed("tesseract", "second", true)]);
        let results = registry.extract_all(&image());

        let ids: Vec<_> = results.iter().map(|r| r.engine_id.as_str()).collect();
        assert_eq!(ids, vec!["easyocr", "tesseract"]);
        assert_eq!(results[1].extracted_text, "second");
    }

    #[test]
    fn test_duplicate_ids_are_ignored() {
        let registry = EngineRegistry::new(vec![fixed("tesseract", "a", true), fixed("tesseract", "b", true)]);
        assert_eq!(registry.ids(), vec!["tesseract"]);
        assert_eq!(registry.extract_all(&image())[0].extracted_text, "a");
    }

    #[test]
    fn test_statuses() {
        let registry = EngineRegistry::new(vec![fixed("easyocr", "", false), fixed("tesseract", "x", true)]);
        let statuses = registry.statuses();

        assert_eq!(
            statuses,
            vec![
                EngineStatus {
                    id: "easyocr".into(),
                    available: false
                },
                EngineStatus {
                    id: "tesseract".into(),
                    available: true
                },
            ]
        );
        assert!(registry.any_available());
        assert!(!EngineRegistry::new(Vec::new()).any_available());
    }

    #[test]
    fn test_default_engine_order() {
        let registry = EngineRegistry::from_config(&OcrConfig::default());
        assert_eq!(registry.ids(), vec!["easyocr", "tesseract"]);
    }

    #[test]
    fn test_global_is_shared() {
        let a = EngineRegistry::global();
        let b = EngineRegistry::global();
        assert!(std::ptr::eq(a, b));
    }
}
