//! Classical (token-level) engine adapter
//!
//! Wraps an engine that scores individual tokens rather than blocks, such
//! as Tesseract. The adapter aggregates token confidences into one overall
//! score for the whole image.

use std::fs::File;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

use image::DynamicImage;
use wait_timeout::ChildExt;

use super::engine::{EngineAdapter, EngineHandle};
use super::types::{BoundingBox, EngineError, EngineResult, TextRegion};
use crate::preprocess::PreprocessedImage;

/// Default engine identifier
pub const TESSERACT_ENGINE_ID: &str = "tesseract";

/// Tokens at or below this confidence are ignored
pub const DEFAULT_MIN_TOKEN_CONFIDENCE: f64 = 0.30;

/// Backend returning per-token results with confidences in [0, 1]
pub trait TokenEngine: Send {
    fn recognize_tokens(&mut self, image: &DynamicImage) -> Result<Vec<TextRegion>, EngineError>;
}

/// Variant A: single whole-image call, token confidences averaged
pub struct ClassicalAdapter {
    id: String,
    min_confidence: f64,
    handle: EngineHandle<Box<dyn TokenEngine>>,
}

impl ClassicalAdapter {
    pub fn new(id: impl Into<String>, min_confidence: f64, handle: EngineHandle<Box<dyn TokenEngine>>) -> Self {
        Self {
            id: id.into(),
            min_confidence,
            handle,
        }
    }

    /// Adapter over an already constructed backend
    pub fn with_engine(id: impl Into<String>, min_confidence: f64, engine: impl TokenEngine + 'static) -> Self {
        let id = id.into();
        let handle = EngineHandle::ready(id.clone(), Box::new(engine) as Box<dyn TokenEngine>);
        Self::new(id, min_confidence, handle)
    }

    /// Tesseract CLI adapter, initialized on first use
    pub fn tesseract(config: TesseractConfig, min_confidence: f64) -> Self {
        let handle = EngineHandle::lazy(TESSERACT_ENGINE_ID, move || {
            TesseractCli::initialize(&config).map(|engine| Box::new(engine) as Box<dyn TokenEngine>)
        });
        Self::new(TESSERACT_ENGINE_ID, min_confidence, handle)
    }
}

impl EngineAdapter for ClassicalAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_available(&self) -> bool {
        self.handle.is_available()
    }

    fn extract(&self, image: &PreprocessedImage) -> EngineResult {
        match self.handle.with(|engine| engine.recognize_tokens(&image.image)) {
            Ok(tokens) => {
                let kept = keep_confident_tokens(tokens, self.min_confidence);
                let result = EngineResult::from_regions(&self.id, kept);
                tracing::debug!(
                    "{} recognized {} tokens (confidence {:.3})",
                    self.id,
                    result.regions.len(),
                    result.confidence
                );
                result
            }
            Err(e) => {
                tracing::warn!("{} extraction failed: {}", self.id, e);
                EngineResult::failed(&self.id, e)
            }
        }
    }
}

/// Drop empty tokens and tokens not above the confidence floor
fn keep_confident_tokens(tokens: Vec<TextRegion>, min_confidence: f64) -> Vec<TextRegion> {
    tokens
        .into_iter()
        .filter_map(|token| {
            let text = token.text.trim();
            if text.is_empty() || token.confidence <= min_confidence {
                return None;
            }
            Some(TextRegion {
                text: text.to_string(),
                ..token
            })
        })
        .collect()
}

/// Tesseract CLI configuration
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Binary name or path
    pub binary: String,
    /// Tesseract language codes, e.g. `eng`, `hin`
    pub languages: Vec<String>,
    /// Page segmentation mode
    pub psm: u8,
    /// Longest a single Tesseract process may run before it is killed
    pub timeout: Duration,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            languages: vec!["eng".to_string(), "hin".to_string()],
            psm: 3,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Tesseract invoked as an external process with TSV output
pub struct TesseractCli {
    binary: String,
    languages: String,
    psm: u8,
    timeout: Duration,
}

impl TesseractCli {
    /// Check the binary runs and keep the requested languages it has installed
    pub fn initialize(config: &TesseractConfig) -> Result<Self, EngineError> {
        let workdir = scratch_dir().map_err(|e| EngineError::NotAvailable(e.to_string()))?;
        let output = run_with_deadline(
            Command::new(&config.binary).arg("--list-langs"),
            workdir.path(),
            config.timeout,
        )
        .map_err(|e| EngineError::NotAvailable(format!("Failed to run {}: {}", config.binary, e)))?
        .ok_or_else(|| {
            EngineError::NotAvailable(format!(
                "{} --list-langs timed out after {:?}",
                config.binary, config.timeout
            ))
        })?;

        if !output.status.success() {
            return Err(EngineError::NotAvailable(format!(
                "{} --list-langs exited with {}",
                config.binary, output.status
            )));
        }

        // Older releases print the list on stderr
        let listing = format!("{}\n{}", output.stdout, output.stderr);
        let installed = parse_language_list(&listing);

        let (usable, missing): (Vec<&String>, Vec<&String>) = config
            .languages
            .iter()
            .partition(|lang| installed.iter().any(|i| i == *lang));

        if !missing.is_empty() {
            tracing::warn!("Tesseract languages not installed: {:?}", missing);
        }
        if usable.is_empty() {
            return Err(EngineError::NotAvailable(format!(
                "none of the requested Tesseract languages {:?} are installed",
                config.languages
            )));
        }

        Ok(Self {
            binary: config.binary.clone(),
            languages: usable.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("+"),
            psm: config.psm,
            timeout: config.timeout,
        })
    }
}

impl TokenEngine for TesseractCli {
    fn recognize_tokens(&mut self, image: &DynamicImage) -> Result<Vec<TextRegion>, EngineError> {
        // Input, TSV and captured output are removed when `workdir` drops, on every path
        let workdir = scratch_dir()
            .map_err(|e| EngineError::ProcessingError(format!("Failed to create temp dir: {}", e)))?;
        let input = workdir.path().join("input.png");
        let output_base = workdir.path().join("output");

        image
            .save_with_format(&input, image::ImageFormat::Png)
            .map_err(|e| EngineError::ImageError(e.to_string()))?;

        let mut command = Command::new(&self.binary);
        command
            .arg(&input)
            .arg(&output_base)
            .arg("-l")
            .arg(&self.languages)
            .arg("--oem")
            .arg("3")
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("tsv");

        let output = run_with_deadline(&mut command, workdir.path(), self.timeout)
            .map_err(|e| EngineError::ProcessingError(format!("Failed to run tesseract: {}", e)))?
            .ok_or_else(|| EngineError::ProcessingError(format!("Tesseract timed out after {:?}", self.timeout)))?;

        if !output.status.success() {
            return Err(EngineError::ProcessingError(format!(
                "Tesseract failed: {}",
                output.stderr.trim()
            )));
        }

        let tsv = std::fs::read(output_base.with_extension("tsv"))
            .map_err(|e| EngineError::InvalidOutput(format!("Tesseract wrote no TSV: {}", e)))?;
        parse_tsv(&String::from_utf8_lossy(&tsv))
    }
}

/// Output of a child process that finished in time
struct ProcessOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

fn scratch_dir() -> std::io::Result<tempfile::TempDir> {
    tempfile::Builder::new().prefix("ocr-tesseract-").tempdir()
}

/// Run `command`, killing it once `timeout` elapses
///
/// Returns `Ok(None)` when the process was killed. Output is captured in
/// files under `workdir`, so a child can never stall on a full pipe.
fn run_with_deadline(
    command: &mut Command,
    workdir: &Path,
    timeout: Duration,
) -> std::io::Result<Option<ProcessOutput>> {
    let stdout_path = workdir.join("stdout.log");
    let stderr_path = workdir.join("stderr.log");

    let mut child = command
        .stdin(Stdio::null())
        .stdout(File::create(&stdout_path)?)
        .stderr(File::create(&stderr_path)?)
        .spawn()?;

    let Some(status) = child.wait_timeout(timeout)? else {
        if let Err(e) = child.kill() {
            tracing::warn!("Failed to kill timed out process: {}", e);
        }
        child.wait()?;
        return Ok(None);
    };

    Ok(Some(ProcessOutput {
        status,
        stdout: String::from_utf8_lossy(&std::fs::read(&stdout_path)?).into_owned(),
        stderr: String::from_utf8_lossy(&std::fs::read(&stderr_path)?).into_owned(),
    }))
}

fn parse_language_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of"))
        .map(str::to_string)
        .collect()
}

/// Parse Tesseract TSV output into word tokens
///
/// Only word rows (level 5) are kept. Confidences are rescaled from 0–100;
/// Tesseract reports -1 for rows without a score.
pub fn parse_tsv(tsv: &str) -> Result<Vec<TextRegion>, EngineError> {
    let mut lines = tsv.lines();
    let header: Vec<&str> = lines
        .next()
        .ok_or_else(|| EngineError::InvalidOutput("empty TSV output".to_string()))?
        .split('\t')
        .collect();

    let column = |name: &str| {
        header
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| EngineError::InvalidOutput(format!("TSV header missing '{}'", name)))
    };
    let level = column("level")?;
    let left = column("left")?;
    let top = column("top")?;
    let width = column("width")?;
    let height = column("height")?;
    let conf = column("conf")?;
    let text = column("text")?;

    let mut tokens = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.splitn(header.len(), '\t').collect();
        if fields.get(level).map(|l| l.trim()) != Some("5") {
            continue;
        }

        let number = |idx: usize| -> f32 {
            fields
                .get(idx)
                .and_then(|v| v.trim().parse::<f32>().ok())
                .unwrap_or(0.0)
        };
        let confidence = fields
            .get(conf)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(-1.0);

        tokens.push(TextRegion {
            text: fields.get(text).copied().unwrap_or("").to_string(),
            confidence: (confidence / 100.0).clamp(0.0, 1.0),
            bounding_box: BoundingBox::new(number(left), number(top), number(width), number(height)),
        });
    }

    Ok(tokens)
}
