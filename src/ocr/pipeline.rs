//! Preprocess, run every engine, arbitrate

use image::DynamicImage;

use super::arbiter::{ArbitratedResult, ResultArbitrator};
use super::registry::EngineRegistry;
use crate::preprocess::{ImagePreprocessor, ImageSource};

/// Recognition of a single raster through all registered engines
#[derive(Debug, Clone)]
pub struct RecognitionPipeline {
    preprocessor: ImagePreprocessor,
    registry: EngineRegistry,
    arbitrator: ResultArbitrator,
}

impl RecognitionPipeline {
    pub fn new(preprocessor: ImagePreprocessor, registry: EngineRegistry, arbitrator: ResultArbitrator) -> Self {
        Self {
            preprocessor,
            registry,
            arbitrator,
        }
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn preprocessor(&self) -> &ImagePreprocessor {
        &self.preprocessor
    }

    pub fn arbitrator(&self) -> &ResultArbitrator {
        &self.arbitrator
    }

    pub fn recognize(&self, image: &DynamicImage, source: ImageSource) -> ArbitratedResult {
        let prepared = self.preprocessor.preprocess(image, source);
        let results = self.registry.extract_all(&prepared);
        let chosen = self.arbitrator.choose(&results);

        tracing::debug!(
            "Arbitration for {:?} chose {} (confidence {:.3}, {} engines)",
            prepared.source,
            chosen.chosen_engine_id,
            chosen.confidence,
            results.len()
        );
        chosen
    }
}
