//! Page text and rasterization helpers

use std::io::Cursor;

use image::{DynamicImage, RgbaImage};
use mupdf::{Colorspace, Matrix, Page, Pixmap, TextPageOptions};

use crate::document::{DocumentError, DocumentResult};

/// Plain text of a page's embedded text layer
pub fn page_text(page: &Page) -> DocumentResult<String> {
    let text_page = page.to_text_page(TextPageOptions::empty())?;
    text_page
        .to_text()
        .map_err(|e| DocumentError::TextExtractionError(e.to_string()))
}

const MIN_ZOOM: f32 = 0.25;
const MAX_ZOOM: f32 = 8.0;

/// Render a page at `zoom` and encode it as PNG
///
/// Rendered without alpha so the page background is white. The zoom is
/// lowered when the raster would exceed `max_pixels`.
pub fn rasterize_page(page: &Page, zoom: f32, max_pixels: u64) -> DocumentResult<Vec<u8>> {
    let bounds = page.bounds()?;
    let zoom = fit_zoom(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0, zoom, max_pixels)?;
    let matrix = Matrix::new_scale(zoom, zoom);
    let pixmap = page.to_pixmap(&matrix, &Colorspace::device_rgb(), false, true)?;
    encode_png(&pixmap)
}

/// Zoom at which a `width` x `height` point page fits in `max_pixels`
///
/// Returns the requested zoom (clamped to 0.25..=8) when it fits, a smaller
/// one when it does not, and an error when even the minimum zoom is over
/// budget.
pub fn fit_zoom(width: f32, height: f32, zoom: f32, max_pixels: u64) -> DocumentResult<f32> {
    if !(width > 0.0 && height > 0.0) || !width.is_finite() || !height.is_finite() {
        return Err(DocumentError::RenderError(format!(
            "Invalid page size {}x{} pt",
            width, height
        )));
    }

    let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    let pixels_at = |z: f32| (f64::from(width * z)).ceil() * (f64::from(height * z)).ceil();
    let budget = max_pixels as f64;
    if pixels_at(zoom) <= budget {
        return Ok(zoom);
    }

    // Rounded down so the ceil'd raster dimensions stay within budget
    let fitted = ((budget / (f64::from(width) * f64::from(height))).sqrt() * 0.999) as f32;
    if fitted < MIN_ZOOM || pixels_at(fitted) > budget {
        return Err(DocumentError::RenderError(format!(
            "Page of {:.0}x{:.0} pt exceeds the raster budget of {} pixels",
            width, height, max_pixels
        )));
    }

    tracing::debug!(
        "Lowering raster zoom from {} to {:.3} for a {:.0}x{:.0} pt page",
        zoom,
        fitted,
        width,
        height
    );
    Ok(fitted)
}

/// Encode a pixmap as PNG
pub fn encode_png(pixmap: &Pixmap) -> DocumentResult<Vec<u8>> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            let r = samples.get(offset).copied().unwrap_or(0);
            // Single-channel pixmaps are gray
            let (g, b) = if n >= 3 {
                (
                    samples.get(offset + 1).copied().unwrap_or(0),
                    samples.get(offset + 2).copied().unwrap_or(0),
                )
            } else {
                (r, r)
            };
            let a = if n >= 4 {
                samples.get(offset + 3).copied().unwrap_or(255)
            } else {
                255
            };
            rgba.extend_from_slice(&[r, g, b, a]);
        }
    }

    let img = RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| DocumentError::ImageError("Failed to create image buffer".to_string()))?;

    let mut output = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)
        .map_err(|e| DocumentError::RenderError(e.to_string()))?;
    Ok(output)
}
