//! Extraction facade
//!
//! Single entry point turning a raw upload into a normalized
//! [`DocumentExtraction`]. Images go straight through the recognition
//! pipeline; PDFs are handed to the page strategist. Nothing in here fails:
//! problems surface as the extraction's status and error fields.

use crate::config::Config;
use crate::document::{DocumentExtraction, MediaKind, PageResult, PageStrategy, RawDocument};
use crate::ocr::{ArbitrationWeights, EngineRegistry, RecognitionPipeline, ResultArbitrator};
use crate::pdf::{MuPdfPageSource, PdfPageStrategist, PdfStrategyConfig};
use crate::preprocess::{ImagePreprocessor, ImageSource, PreprocessOptions};

/// Extraction facade over an injected engine registry
#[derive(Debug, Clone)]
pub struct ExtractionFacade {
    registry: EngineRegistry,
    preprocess: PreprocessOptions,
    weights: ArbitrationWeights,
    pdf: PdfStrategyConfig,
}

impl ExtractionFacade {
    /// Facade with default preprocessing, weights and PDF strategy
    pub fn new(registry: EngineRegistry) -> Self {
        Self {
            registry,
            preprocess: PreprocessOptions::default(),
            weights: ArbitrationWeights::default(),
            pdf: PdfStrategyConfig::default(),
        }
    }

    pub fn from_config(config: &Config, registry: EngineRegistry) -> Self {
        Self::new(registry)
            .with_preprocess(config.preprocess.clone())
            .with_weights(config.ocr.weights)
            .with_pdf_strategy(config.pdf.clone())
    }

    pub fn with_preprocess(mut self, options: PreprocessOptions) -> Self {
        self.preprocess = options;
        self
    }

    pub fn with_weights(mut self, weights: ArbitrationWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_pdf_strategy(mut self, config: PdfStrategyConfig) -> Self {
        self.pdf = config;
        self
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn preprocess_options(&self) -> &PreprocessOptions {
        &self.preprocess
    }

    fn pipeline(&self) -> RecognitionPipeline {
        RecognitionPipeline::new(
            ImagePreprocessor::new(self.preprocess.clone()),
            self.registry.clone(),
            ResultArbitrator::new(self.weights),
        )
    }

    /// Extract text from a document, dispatching on its media kind
    pub fn extract(&self, doc: &RawDocument) -> DocumentExtraction {
        let extraction = match &doc.kind {
            MediaKind::Image => self.extract_image(doc),
            MediaKind::Pdf => self.extract_pdf(doc),
            kind @ MediaKind::Unsupported(_) => {
                tracing::warn!("Rejecting {}: unsupported type {}", doc.filename, kind);
                DocumentExtraction::unsupported(kind)
            }
        };

        tracing::info!(
            "Extracted {} ({}): {:?}, {} pages, {} chars, confidence {:.3}",
            doc.filename,
            doc.kind,
            extraction.status,
            extraction.pages.len(),
            extraction.text.chars().count(),
            extraction.confidence
        );
        extraction
    }

    fn extract_image(&self, doc: &RawDocument) -> DocumentExtraction {
        let image = match image::load_from_memory(&doc.bytes) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("Failed to decode image {}: {}", doc.filename, e);
                return DocumentExtraction::unreadable(format!("Failed to decode image: {}", e));
            }
        };

        let chosen = self.pipeline().recognize(
            &image,
            ImageSource::Upload {
                filename: doc.filename.clone(),
            },
        );

        let page = PageResult {
            page_number: 1,
            direct_text: String::new(),
            ocr_text: Some(chosen.text.clone()),
            final_text: chosen.text.clone(),
            confidence: chosen.confidence,
            strategy_used: PageStrategy::Ocr,
            error: None,
        };

        let mut extraction = DocumentExtraction::from_pages(vec![page]);
        // A single page: the document score is the arbitrated score
        extraction.confidence = chosen.confidence;
        extraction.best_engine = Some(chosen.chosen_engine_id);
        extraction.all_engine_results = Some(chosen.all_engine_results);
        extraction
    }

    fn extract_pdf(&self, doc: &RawDocument) -> DocumentExtraction {
        let source = match MuPdfPageSource::open(doc.bytes.clone(), doc.filename.clone()) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("Failed to open PDF {}: {}", doc.filename, e);
                return DocumentExtraction::unreadable(format!("Failed to open PDF: {}", e));
            }
        };

        let strategist = PdfPageStrategist::new(self.pdf.clone(), self.pipeline());
        DocumentExtraction::from_pages(strategist.extract_pages(&source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ExtractionStatus;
    use crate::ocr::{EngineAdapter, EngineResult, NO_ENGINE};
    use crate::preprocess::PreprocessedImage;
    use image::{DynamicImage, GrayImage, Luma};
    use std::io::Cursor;
    use std::sync::Arc;

    struct Fixed(&'static str, &'static str, f64);

    impl EngineAdapter for Fixed {
        fn id(&self) -> &str {
            self.0
        }

        fn is_available(&self) -> bool {
            true
        }

        fn extract(&self, _image: &PreprocessedImage) -> EngineResult {
            EngineResult {
                extracted_text: self.1.to_string(),
                confidence: self.2,
                regions: Vec::new(),
                engine_id: self.0.to_string(),
                error: None,
            }
        }
    }

    fn png_bytes() -> Vec<u8> {
        let mut png = Vec::new();
        DynamicImage::ImageLuma8(GrayImage::from_pixel(60, 30, Luma([250])))
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        png
    }

    fn facade(engines: Vec<Arc<dyn EngineAdapter>>) -> ExtractionFacade {
        ExtractionFacade::new(EngineRegistry::new(engines))
    }

    #[test]
    fn test_image_uses_arbitrated_result() {
        let facade = facade(vec![
            Arc::new(Fixed("easyocr", "TOTAL 1,250.00 INR", 0.64)) as Arc<dyn EngineAdapter>,
            Arc::new(Fixed("tesseract", "TOTAL 1,25O.0O", 0.71)),
        ]);
        let doc = RawDocument::new(png_bytes(), MediaKind::Image, "receipt.png");

        let extraction = facade.extract(&doc);

        assert!(extraction.is_ok());
        assert_eq!(extraction.best_engine.as_deref(), Some("tesseract"));
        assert_eq!(extraction.text, "TOTAL 1,25O.0O");
        assert_eq!(extraction.confidence, 0.71);
        assert_eq!(extraction.pages.len(), 1);
        assert_eq!(extraction.pages[0].strategy_used, PageStrategy::Ocr);
        assert_eq!(extraction.all_engine_results.unwrap().len(), 2);
    }

    #[test]
    fn test_image_with_no_usable_engine() {
        let facade = facade(vec![Arc::new(Fixed("easyocr", "", 0.0)) as Arc<dyn EngineAdapter>]);
        let doc = RawDocument::new(png_bytes(), MediaKind::Image, "blank.png");

        let extraction = facade.extract(&doc);

        assert_eq!(extraction.text, "");
        assert_eq!(extraction.confidence, 0.0);
        assert_eq!(extraction.best_engine.as_deref(), Some(NO_ENGINE));
    }

    #[test]
    fn test_unsupported_type() {
        let doc = RawDocument::detect(b"hello".to_vec(), "notes.txt");
        let extraction = facade(Vec::new()).extract(&doc);

        assert_eq!(extraction.status, ExtractionStatus::UnsupportedType);
        assert_eq!(extraction.confidence, 0.0);
        assert_eq!(extraction.error.as_deref(), Some("Unsupported file type: .txt"));
    }

    #[test]
    fn test_undecodable_image_is_unreadable() {
        let doc = RawDocument::new(b"definitely not pixels".to_vec(), MediaKind::Image, "broken.jpg");
        let extraction = facade(vec![Arc::new(Fixed("tesseract", "x", 0.9)) as Arc<dyn EngineAdapter>]).extract(&doc);

        assert_eq!(extraction.status, ExtractionStatus::Unreadable);
        assert_eq!(extraction.text, "");
        assert_eq!(extraction.confidence, 0.0);
    }

    #[test]
    fn test_unopenable_pdf_is_unreadable() {
        let doc = RawDocument::new(b"not a pdf at all".to_vec(), MediaKind::Pdf, "scan.pdf");
        let extraction = facade(Vec::new()).extract(&doc);

        assert_eq!(extraction.status, ExtractionStatus::Unreadable);
        assert!(extraction.error.unwrap().starts_with("Failed to open PDF"));
    }
}
