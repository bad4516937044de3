//! Configuration management for the OCR extraction server

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::ocr::{
    ArbitrationWeights, RegionServiceConfig, TesseractConfig, DEFAULT_MIN_REGION_CONFIDENCE,
    DEFAULT_MIN_TOKEN_CONFIDENCE,
};
use crate::pdf::PdfStrategyConfig;
use crate::preprocess::PreprocessOptions;

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be between 0 and 1, got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },

    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("PREPROCESS_BLOCK_SIZE must be odd and at least 3, got {0}")]
    InvalidBlockSize(u32),

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub pdf: PdfStrategyConfig,
    pub preprocess: PreprocessOptions,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Upper bound on one extraction, queueing included
    pub extraction_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_upload_bytes: 25 * 1024 * 1024,
            extraction_timeout: Duration::from_secs(120),
        }
    }
}

/// Engine backends, thresholds and arbitration weights
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub tesseract: TesseractConfig,
    pub region_service: RegionServiceConfig,
    pub min_token_confidence: f64,
    pub min_region_confidence: f64,
    pub weights: ArbitrationWeights,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract: TesseractConfig::default(),
            region_service: RegionServiceConfig::default(),
            min_token_confidence: DEFAULT_MIN_TOKEN_CONFIDENCE,
            min_region_confidence: DEFAULT_MIN_REGION_CONFIDENCE,
            weights: ArbitrationWeights::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(&lookup);
        let server_defaults = ServerConfig::default();

        let config = Config {
            server: ServerConfig {
                host: vars.string("SERVER_HOST", &server_defaults.host),
                port: vars.parse("SERVER_PORT", server_defaults.port),
                max_upload_bytes: vars.parse("MAX_UPLOAD_BYTES", server_defaults.max_upload_bytes),
                extraction_timeout: Duration::from_secs(
                    vars.parse("EXTRACTION_TIMEOUT_SECS", server_defaults.extraction_timeout.as_secs()),
                ),
            },
            ocr: OcrConfig::from_vars(&vars),
            pdf: pdf_from_vars(&vars),
            preprocess: preprocess_from_vars(&vars),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ocr.validate()?;

        let pdf = &self.pdf;
        unit_range("PDF_DIRECT_CONFIDENCE", pdf.direct_confidence)?;
        unit_range("PDF_OCR_ERROR_CONFIDENCE", pdf.ocr_error_confidence)?;
        positive("PDF_RASTER_ZOOM", f64::from(pdf.raster_zoom))?;
        positive("PDF_MAX_RASTER_PIXELS", pdf.max_raster_pixels as f64)?;
        positive("EXTRACTION_TIMEOUT_SECS", self.server.extraction_timeout.as_secs_f64())?;

        let block = self.preprocess.block_size;
        if block < 3 || block % 2 == 0 {
            return Err(ConfigError::InvalidBlockSize(block));
        }
        Ok(())
    }
}

impl OcrConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup = |key: &str| env::var(key).ok();
        let config = Self::from_vars(&Vars(&lookup));
        config.validate()?;
        Ok(config)
    }

    fn from_vars(vars: &Vars<'_>) -> Self {
        let defaults = OcrConfig::default();
        let weights = ArbitrationWeights {
            confidence_weight: vars.parse("OCR_CONFIDENCE_WEIGHT", defaults.weights.confidence_weight),
            length_weight: vars.parse("OCR_LENGTH_WEIGHT", defaults.weights.length_weight),
            length_cap: vars.parse("OCR_LENGTH_CAP", defaults.weights.length_cap),
        };

        OcrConfig {
            tesseract: TesseractConfig {
                binary: vars.string("TESSERACT_BIN", &defaults.tesseract.binary),
                languages: vars
                    .list("TESSERACT_LANGUAGES", '+')
                    .unwrap_or(defaults.tesseract.languages),
                psm: vars.parse("TESSERACT_PSM", defaults.tesseract.psm),
                timeout: Duration::from_secs(
                    vars.parse("TESSERACT_TIMEOUT_SECS", defaults.tesseract.timeout.as_secs()),
                ),
            },
            region_service: RegionServiceConfig {
                url: vars.string("OCR_SERVICE_URL", &defaults.region_service.url),
                languages: vars
                    .list("OCR_SERVICE_LANGUAGES", ',')
                    .unwrap_or(defaults.region_service.languages),
                timeout: Duration::from_secs(
                    vars.parse("OCR_SERVICE_TIMEOUT_SECS", defaults.region_service.timeout.as_secs()),
                ),
            },
            min_token_confidence: vars.parse("OCR_MIN_TOKEN_CONFIDENCE", defaults.min_token_confidence),
            min_region_confidence: vars.parse("OCR_MIN_REGION_CONFIDENCE", defaults.min_region_confidence),
            weights,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_range("OCR_MIN_TOKEN_CONFIDENCE", self.min_token_confidence)?;
        unit_range("OCR_MIN_REGION_CONFIDENCE", self.min_region_confidence)?;
        unit_range("OCR_CONFIDENCE_WEIGHT", self.weights.confidence_weight)?;
        unit_range("OCR_LENGTH_WEIGHT", self.weights.length_weight)?;
        positive("OCR_LENGTH_CAP", self.weights.length_cap)?;
        positive("TESSERACT_TIMEOUT_SECS", self.tesseract.timeout.as_secs_f64())?;
        if self.tesseract.languages.is_empty() {
            return Err(ConfigError::Empty("TESSERACT_LANGUAGES"));
        }
        if self.region_service.url.trim().is_empty() {
            return Err(ConfigError::Empty("OCR_SERVICE_URL"));
        }
        Ok(())
    }
}

fn pdf_from_vars(vars: &Vars<'_>) -> PdfStrategyConfig {
    let defaults = PdfStrategyConfig::default();
    PdfStrategyConfig {
        direct_min_chars: vars.parse("PDF_DIRECT_MIN_CHARS", defaults.direct_min_chars),
        direct_confidence: vars.parse("PDF_DIRECT_CONFIDENCE", defaults.direct_confidence),
        ocr_error_confidence: vars.parse("PDF_OCR_ERROR_CONFIDENCE", defaults.ocr_error_confidence),
        raster_zoom: vars.parse("PDF_RASTER_ZOOM", defaults.raster_zoom),
        max_raster_pixels: vars.parse("PDF_MAX_RASTER_PIXELS", defaults.max_raster_pixels),
        scratch_dir: vars
            .get("OCR_SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.scratch_dir),
    }
}

fn preprocess_from_vars(vars: &Vars<'_>) -> PreprocessOptions {
    let defaults = PreprocessOptions::default();
    PreprocessOptions {
        denoise: vars.flag("PREPROCESS_DENOISE", defaults.denoise),
        binarize: vars.flag("PREPROCESS_BINARIZE", defaults.binarize),
        morphology: vars.flag("PREPROCESS_MORPHOLOGY", defaults.morphology),
        morphology_radius: vars.parse("PREPROCESS_MORPHOLOGY_RADIUS", defaults.morphology_radius),
        block_size: vars.parse("PREPROCESS_BLOCK_SIZE", defaults.block_size),
        offset: vars.parse("PREPROCESS_OFFSET", defaults.offset),
        ..defaults
    }
}

fn unit_range(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { name, value })
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

/// Typed access to configuration variables
///
/// Unset or blank variables yield the default; malformed values log a
/// warning and yield the default.
struct Vars<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Vars<'_> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> T {
        match self.get(key) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("Ignoring malformed {}={:?}", key, raw);
                default
            }),
            None => default,
        }
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(|v| v.to_ascii_lowercase()) {
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
            Some(v) => {
                tracing::warn!("Ignoring malformed {}={:?}", key, v);
                default
            }
            None => default,
        }
    }

    fn list(&self, key: &str, separator: char) -> Option<Vec<String>> {
        let items: Vec<String> = self
            .get(key)?
            .split(separator)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        (!items.is_empty()).then_some(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(config.ocr.tesseract.languages, vec!["eng", "hin"]);
        assert_eq!(config.ocr.region_service.languages, vec!["en", "hi"]);
        assert_eq!(config.ocr.weights, ArbitrationWeights::default());
        assert_eq!(config.pdf.direct_min_chars, 50);
        assert_eq!(config.preprocess.block_size, 11);
        assert!(config.preprocess.morphology);
        assert_eq!(config.preprocess.morphology_radius, 0);
        assert_eq!(config.ocr.tesseract.timeout, Duration::from_secs(60));
        assert_eq!(config.pdf.max_raster_pixels, 50_000_000);
    }

    #[test]
    fn test_variables_override_defaults() {
        let config = config_from(&[
            ("SERVER_PORT", "8080"),
            ("TESSERACT_LANGUAGES", "eng+hin+mar"),
            ("OCR_SERVICE_LANGUAGES", "en, hi"),
            ("OCR_SERVICE_URL", "http://ocr:9000/"),
            ("OCR_CONFIDENCE_WEIGHT", "0.5"),
            ("OCR_LENGTH_WEIGHT", "0.5"),
            ("PDF_DIRECT_MIN_CHARS", "80"),
            ("OCR_SCRATCH_DIR", "/var/tmp/ocr"),
            ("PREPROCESS_MORPHOLOGY", "off"),
            ("PREPROCESS_BLOCK_SIZE", "15"),
            ("TESSERACT_TIMEOUT_SECS", "15"),
            ("PREPROCESS_MORPHOLOGY_RADIUS", "1"),
            ("PDF_MAX_RASTER_PIXELS", "20000000"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ocr.tesseract.languages, vec!["eng", "hin", "mar"]);
        assert_eq!(config.ocr.region_service.languages, vec!["en", "hi"]);
        assert_eq!(config.ocr.region_service.url, "http://ocr:9000/");
        assert_eq!(config.ocr.weights.confidence_weight, 0.5);
        assert_eq!(config.pdf.direct_min_chars, 80);
        assert_eq!(config.pdf.scratch_dir, PathBuf::from("/var/tmp/ocr"));
        assert!(!config.preprocess.morphology);
        assert_eq!(config.preprocess.block_size, 15);
        assert_eq!(config.ocr.tesseract.timeout, Duration::from_secs(15));
        assert_eq!(config.pdf.max_raster_pixels, 20_000_000);
        assert_eq!(config.preprocess.morphology_radius, 1);
    }

    #[test]
    fn test_malformed_numbers_fall_back() {
        let config = config_from(&[("SERVER_PORT", "eighty"), ("PDF_RASTER_ZOOM", ""), ("PREPROCESS_DENOISE", "maybe")])
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.pdf.raster_zoom, 2.0);
        assert!(config.preprocess.denoise);
    }

    #[test]
    fn test_validation_rejects_out_of_range_values() {
        assert!(matches!(
            config_from(&[("OCR_MIN_TOKEN_CONFIDENCE", "30")]),
            Err(ConfigError::OutOfUnitRange { .. })
        ));
        assert!(matches!(
            config_from(&[("PREPROCESS_BLOCK_SIZE", "10")]),
            Err(ConfigError::InvalidBlockSize(10))
        ));
        assert!(matches!(
            config_from(&[("OCR_LENGTH_CAP", "0")]),
            Err(ConfigError::NotPositive { .. })
        ));
        assert!(matches!(
            config_from(&[("TESSERACT_TIMEOUT_SECS", "0")]),
            Err(ConfigError::NotPositive { .. })
        ));
        assert!(matches!(
            config_from(&[("PDF_MAX_RASTER_PIXELS", "0")]),
            Err(ConfigError::NotPositive { .. })
        ));
        assert!(Config::default().validate().is_ok());
    }
}
