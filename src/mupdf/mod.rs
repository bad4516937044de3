//! Low-level MuPDF wrapper
//!
//! MuPDF's `fz_context` is **not** thread-safe. [`SafeDocument`] keeps the
//! PDF bytes and opens a fresh document for every operation under a mutex,
//! so no MuPDF handle outlives the closure that uses it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ocr_arbiter::mupdf::{encode_png, SafeDocument};
//!
//! let doc = SafeDocument::from_bytes(pdf_bytes, "upload-1".into())?;
//! let png = doc.with_page(0, |page| {
//!     let pixmap = page.to_pixmap(&Matrix::new_scale(2.0, 2.0), &Colorspace::device_rgb(), false, true)?;
//!     encode_png(&pixmap)
//! })?;
//! ```

mod render;
mod safe;

pub use render::{encode_png, fit_zoom, page_text, rasterize_page};
pub use safe::SafeDocument;
