//! Image preprocessing for recognition
//!
//! Normalizes a scanned raster before it reaches the engines:
//!
//! 1. grayscale conversion
//! 2. median denoising (scanner speckle)
//! 3. adaptive thresholding against a Gaussian-weighted local mean
//! 4. closing then opening of the ink layer
//!
//! Every step can be switched off through [`PreprocessOptions`]. The
//! preprocessor never fails the pipeline: if the raster cannot be processed
//! the original image is handed on unmodified.

use image::{imageops, DynamicImage, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::{filter, morphology};
use serde::Serialize;

/// Rasters above this many pixels are passed through untouched
const DEFAULT_MAX_PIXELS: u64 = 120_000_000;

/// Where a preprocessed raster came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ImageSource {
    /// Image uploaded directly
    Upload { filename: String },
    /// Rasterized PDF page (1-indexed)
    #[serde(rename_all = "camelCase")]
    PdfPage { page_number: usize },
}

/// A preprocessing step that was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreprocessStep {
    Grayscale,
    Denoise,
    Binarize,
    Morphology,
}

/// Raster ready for the engines
///
/// Owned by the extraction call that created it.
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    pub image: DynamicImage,
    pub source: ImageSource,
    /// Steps applied, in order. Empty when preprocessing fell back to the
    /// original image.
    pub steps: Vec<PreprocessStep>,
}

impl PreprocessedImage {
    /// Wrap an image without preprocessing it
    pub fn unprocessed(image: DynamicImage, source: ImageSource) -> Self {
        Self {
            image,
            source,
            steps: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

/// Preprocessing options
#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    pub grayscale: bool,
    pub denoise: bool,
    /// Median filter radius (1 → 3×3 window)
    pub denoise_radius: u32,
    pub binarize: bool,
    /// Odd neighbourhood size for the local threshold
    pub block_size: u32,
    /// Subtracted from the local mean before comparison
    pub offset: i32,
    pub morphology: bool,
    /// Structuring element radius; 0 is a 1×1 element (no change)
    pub morphology_radius: u8,
    pub max_pixels: u64,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            grayscale: true,
            denoise: true,
            denoise_radius: 1,
            binarize: true,
            block_size: 11,
            offset: 2,
            morphology: true,
            morphology_radius: 0,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

impl PreprocessOptions {
    /// All steps disabled
    pub fn passthrough() -> Self {
        Self {
            grayscale: false,
            denoise: false,
            binarize: false,
            morphology: false,
            ..Self::default()
        }
    }
}

/// Preprocessing error types
#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("Image has no pixels ({0}x{1})")]
    EmptyImage(u32, u32),

    #[error("Image too large: {0}x{1}")]
    TooLarge(u32, u32),

    #[error("Block size must be odd and at least 3, got {0}")]
    InvalidBlockSize(u32),
}

/// Document image preprocessor
#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor {
    options: PreprocessOptions,
}

impl ImagePreprocessor {
    pub fn new(options: PreprocessOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PreprocessOptions {
        &self.options
    }

    /// Preprocess an image, falling back to the original on any error
    pub fn preprocess(&self, image: &DynamicImage, source: ImageSource) -> PreprocessedImage {
        match self.try_preprocess(image) {
            Ok((processed, steps)) => {
                tracing::debug!("Preprocessed {:?} with steps {:?}", source, steps);
                PreprocessedImage {
                    image: processed,
                    source,
                    steps,
                }
            }
            Err(e) => {
                tracing::warn!("Preprocessing {:?} failed: {}, using original image", source, e);
                PreprocessedImage::unprocessed(image.clone(), source)
            }
        }
    }

    fn try_preprocess(
        &self,
        image: &DynamicImage,
    ) -> Result<(DynamicImage, Vec<PreprocessStep>), PreprocessError> {
        let opts = &self.options;
        let (width, height) = (image.width(), image.height());

        if width == 0 || height == 0 {
            return Err(PreprocessError::EmptyImage(width, height));
        }
        if u64::from(width) * u64::from(height) > opts.max_pixels {
            return Err(PreprocessError::TooLarge(width, height));
        }
        if opts.binarize && (opts.block_size < 3 || opts.block_size % 2 == 0) {
            return Err(PreprocessError::InvalidBlockSize(opts.block_size));
        }

        let mut steps = Vec::new();

        let mut gray = match image {
            DynamicImage::ImageLuma8(gray) => gray.clone(),
            _ if opts.grayscale => image.to_luma8(),
            _ => {
                // The remaining steps need a single channel
                if opts.denoise || opts.binarize || opts.morphology {
                    tracing::debug!("Grayscale disabled on a color image, skipping remaining steps");
                }
                return Ok((image.clone(), steps));
            }
        };
        if opts.grayscale {
            steps.push(PreprocessStep::Grayscale);
        }

        if opts.denoise && opts.denoise_radius > 0 {
            gray = filter::median_filter(&gray, opts.denoise_radius, opts.denoise_radius);
            steps.push(PreprocessStep::Denoise);
        }

        if opts.binarize {
            gray = adaptive_threshold(&gray, opts.block_size, opts.offset);
            steps.push(PreprocessStep::Binarize);
        }

        if opts.morphology && opts.morphology_radius > 0 {
            gray = close_then_open(&gray, opts.morphology_radius);
            steps.push(PreprocessStep::Morphology);
        }

        Ok((DynamicImage::ImageLuma8(gray), steps))
    }
}

/// Gaussian sigma OpenCV derives for a given kernel size
fn sigma_for_block(block_size: u32) -> f32 {
    0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Binarize against a Gaussian-weighted local mean
///
/// A pixel turns white when it is brighter than `local_mean - offset`,
/// black otherwise.
fn adaptive_threshold(gray: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
    let local_mean = filter::gaussian_blur_f32(gray, sigma_for_block(block_size));

    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let threshold = i32::from(local_mean.get_pixel(x, y)[0]) - offset;
        let value = if i32::from(pixel[0]) > threshold { 255 } else { 0 };
        out.put_pixel(x, y, Luma([value]));
    }
    out
}

/// Closing then opening of the dark (ink) layer
///
/// Closing fills pinholes inside strokes, opening removes isolated specks
/// smaller than the structuring element.
fn close_then_open(binary: &GrayImage, radius: u8) -> GrayImage {
    let mut ink = binary.clone();
    imageops::invert(&mut ink);

    let closed = morphology::close(&ink, Norm::L1, radius);
    let mut cleaned = morphology::open(&closed, Norm::L1, radius);

    imageops::invert(&mut cleaned);
    cleaned
}
