//! OCR Arbiter
//!
//! Multi-engine text extraction for scanned images and PDFs. Every image is
//! preprocessed, recognized by each registered engine and the best result is
//! chosen by a weighted confidence/length score. PDF pages use their
//! embedded text when there is enough of it and fall back to
//! rasterize-and-recognize otherwise.
//!
//! # Modules
//!
//! - `preprocess`: grayscale, denoise, adaptive threshold, morphology
//! - `ocr`: engine adapters, registry, arbitration
//! - `pdf`: page-level direct text / OCR strategy
//! - `extraction`: the facade used by callers
//! - `routes`: HTTP surface

pub mod config;
pub mod document;
pub mod error;
pub mod extraction;
pub mod mupdf;
pub mod ocr;
pub mod pdf;
pub mod preprocess;
pub mod routes;
pub mod state;

pub use extraction::ExtractionFacade;
