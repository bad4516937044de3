//! PDF extraction
//!
//! [`PdfPageStrategist`] decides per page between the embedded text layer
//! and rasterize-and-recognize; [`MuPdfPageSource`] supplies both from
//! MuPDF.

mod source;
mod strategist;

pub use source::MuPdfPageSource;
pub use strategist::{PageDecision, PageSource, PdfPageStrategist, PdfStrategyConfig, RasterArtifact};
