//! OCR Module
//!
//! Multi-engine recognition with cross-engine arbitration.
//!
//! Engines are reached through [`EngineAdapter`]:
//! - Classical, token-level recognition (Tesseract, run as a process)
//! - Neural, region-aware recognition (HTTP recognition service)
//!
//! Every registered engine runs on the same preprocessed image and
//! [`ResultArbitrator`] picks one result by a weighted score of confidence
//! and text length.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ocr_arbiter::ocr::{EngineRegistry, RecognitionPipeline, ResultArbitrator};
//! use ocr_arbiter::preprocess::{ImagePreprocessor, ImageSource};
//!
//! let pipeline = RecognitionPipeline::new(
//!     ImagePreprocessor::default(),
//!     EngineRegistry::from_config(&config.ocr),
//!     ResultArbitrator::default(),
//! );
//! let chosen = pipeline.recognize(&image, ImageSource::Upload { filename: "scan.png".into() });
//! println!("{} ({:.2}) via {}", chosen.text, chosen.confidence, chosen.chosen_engine_id);
//! ```

mod arbiter;
mod classical;
mod engine;
mod neural;
mod pipeline;
mod registry;
mod types;

pub use arbiter::{ArbitratedResult, ArbitrationWeights, ResultArbitrator, NO_ENGINE};
pub use classical::{
    parse_tsv, ClassicalAdapter, TesseractCli, TesseractConfig, TokenEngine, DEFAULT_MIN_TOKEN_CONFIDENCE,
    TESSERACT_ENGINE_ID,
};
pub use engine::{EngineAdapter, EngineHandle};
pub use neural::{
    parse_readtext, NeuralAdapter, RegionEngine, RegionServiceClient, RegionServiceConfig,
    DEFAULT_MIN_REGION_CONFIDENCE, NEURAL_ENGINE_ID,
};
pub use pipeline::RecognitionPipeline;
pub use registry::{EngineRegistry, EngineStatus};
pub use types::{BoundingBox, EngineError, EngineResult, TextRegion};
