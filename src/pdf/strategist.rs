//! Page-level strategy for PDFs
//!
//! Each page first offers its embedded text. Pages with enough of it are
//! accepted as-is; the rest are rasterized into a scratch file and sent
//! through the recognition pipeline.

use std::io::Write;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use tempfile::NamedTempFile;

use crate::document::{DocumentResult, PageResult, PageStrategy};
use crate::ocr::{ArbitratedResult, RecognitionPipeline};
use crate::preprocess::ImageSource;

/// Per-page access to a paged document
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Embedded text of a page (0-indexed)
    fn direct_text(&self, index: usize) -> DocumentResult<String>;

    /// Rasterize a page (0-indexed) to PNG bytes
    ///
    /// Implementations lower `zoom` or fail rather than produce a raster of
    /// more than `max_pixels` pixels.
    fn render_png(&self, index: usize, zoom: f32, max_pixels: u64) -> DocumentResult<Vec<u8>>;
}

/// Thresholds and constants of the page strategy
#[derive(Debug, Clone)]
pub struct PdfStrategyConfig {
    /// Trimmed direct text at least this long (in chars) is accepted
    pub direct_min_chars: usize,
    /// Confidence assigned to accepted direct text
    pub direct_confidence: f64,
    /// Confidence of non-empty direct text when the OCR path failed
    pub ocr_error_confidence: f64,
    /// Rasterization zoom factor
    pub raster_zoom: f32,
    /// Upper bound on the pixels of one page raster
    pub max_raster_pixels: u64,
    /// Directory receiving page rasters
    pub scratch_dir: PathBuf,
}

impl Default for PdfStrategyConfig {
    fn default() -> Self {
        Self {
            direct_min_chars: 50,
            direct_confidence: 0.9,
            ocr_error_confidence: 0.8,
            raster_zoom: 2.0,
            max_raster_pixels: 50_000_000,
            scratch_dir: std::env::temp_dir(),
        }
    }
}

/// Outcome of inspecting a page's direct text
#[derive(Debug, Clone, PartialEq)]
pub enum PageDecision {
    /// Direct text is long enough
    Accept(String),
    /// Rasterize and recognize; carries the (possibly empty) direct text
    FallbackToOcr(String),
}

/// A page raster on disk, removed when dropped
#[derive(Debug)]
pub struct RasterArtifact {
    path: PathBuf,
    file: Option<NamedTempFile>,
}

impl RasterArtifact {
    /// Write PNG bytes for a page into the scratch directory
    pub fn write(scratch_dir: &Path, page_number: usize, png: &[u8]) -> DocumentResult<Self> {
        std::fs::create_dir_all(scratch_dir)?;
        let mut file = tempfile::Builder::new()
            .prefix(&format!("page-{}-", page_number))
            .suffix(".png")
            .tempfile_in(scratch_dir)?;
        file.write_all(png)?;
        file.flush()?;

        Ok(Self {
            path: file.path().to_path_buf(),
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the raster
    pub fn load(&self) -> DocumentResult<DynamicImage> {
        Ok(image::open(&self.path)?)
    }
}

impl Drop for RasterArtifact {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.close() {
                tracing::warn!("Failed to remove raster {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Hybrid direct-text / OCR strategy over the pages of a document
#[derive(Debug, Clone)]
pub struct PdfPageStrategist {
    config: PdfStrategyConfig,
    pipeline: RecognitionPipeline,
}

impl PdfPageStrategist {
    pub fn new(config: PdfStrategyConfig, pipeline: RecognitionPipeline) -> Self {
        Self { config, pipeline }
    }

    pub fn config(&self) -> &PdfStrategyConfig {
        &self.config
    }

    /// Process every page in order
    ///
    /// A page that fails never stops the remaining pages.
    pub fn extract_pages(&self, source: &dyn PageSource) -> Vec<PageResult> {
        (0..source.page_count())
            .map(|index| self.process_page(source, index))
            .collect()
    }

    /// Decide between direct text and OCR for trimmed direct text
    pub fn decide(&self, direct_text: &str) -> PageDecision {
        let trimmed = direct_text.trim();
        if trimmed.chars().count() >= self.config.direct_min_chars {
            PageDecision::Accept(trimmed.to_string())
        } else {
            PageDecision::FallbackToOcr(trimmed.to_string())
        }
    }

    pub fn process_page(&self, source: &dyn PageSource, index: usize) -> PageResult {
        let page_number = index + 1;
        let direct_text = source.direct_text(index).unwrap_or_else(|e| {
            tracing::warn!("Page {}: direct text unavailable: {}", page_number, e);
            String::new()
        });

        match self.decide(&direct_text) {
            PageDecision::Accept(text) => {
                tracing::debug!("Page {}: accepted {} chars of direct text", page_number, text.chars().count());
                PageResult {
                    page_number,
                    direct_text: text.clone(),
                    ocr_text: None,
                    final_text: text,
                    confidence: self.config.direct_confidence,
                    strategy_used: PageStrategy::Direct,
                    error: None,
                }
            }
            PageDecision::FallbackToOcr(direct) => match self.recognize_page(source, index) {
                Ok(chosen) => {
                    let ocr_text = chosen.text.trim().to_string();
                    let final_text = if ocr_text.chars().count() > direct.chars().count() {
                        ocr_text.clone()
                    } else {
                        direct.clone()
                    };
                    tracing::debug!(
                        "Page {}: OCR fallback via {} ({} chars)",
                        page_number,
                        chosen.chosen_engine_id,
                        ocr_text.chars().count()
                    );
                    PageResult {
                        page_number,
                        direct_text: direct,
                        ocr_text: Some(ocr_text),
                        final_text,
                        confidence: chosen.confidence,
                        strategy_used: PageStrategy::OcrFallback,
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::warn!("Page {}: OCR fallback failed: {}", page_number, e);
                    let confidence = if direct.is_empty() {
                        0.0
                    } else {
                        self.config.ocr_error_confidence
                    };
                    PageResult {
                        page_number,
                        direct_text: direct.clone(),
                        ocr_text: None,
                        final_text: direct,
                        confidence,
                        strategy_used: PageStrategy::OcrFallback,
                        error: Some(e.to_string()),
                    }
                }
            },
        }
    }

    /// Rasterize, decode and recognize one page
    ///
    /// The raster file lives only for the duration of this call.
    fn recognize_page(&self, source: &dyn PageSource, index: usize) -> DocumentResult<ArbitratedResult> {
        let page_number = index + 1;
        let png = source.render_png(index, self.config.raster_zoom, self.config.max_raster_pixels)?;
        let artifact = RasterArtifact::write(&self.config.scratch_dir, page_number, &png)?;
        let image = artifact.load()?;
        drop(artifact);

        Ok(self.pipeline.recognize(&image, ImageSource::PdfPage { page_number }))
    }
}
