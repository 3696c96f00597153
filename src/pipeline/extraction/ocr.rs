use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::process::Command;

use super::confidence::mean_word_confidence;
use super::preprocess::{preprocess_with, PreprocessOptions};
use super::types::{OcrEngine, OcrPageResult, OcrWordResult};
use super::ExtractionError;
use crate::config::{OcrOrder, Settings};

/// Tesseract invoked as an external binary with TSV output.
pub struct TesseractCli {
    name: String,
    command: String,
    language: String,
    /// Tesseract page segmentation mode.
    psm: u8,
    /// Otsu-binarize the image before handing it over.
    binarize: bool,
}

impl TesseractCli {
    /// Automatic page segmentation, image passed through as given.
    pub fn new(command: &str, language: &str) -> Self {
        Self {
            name: "tesseract".into(),
            command: command.to_string(),
            language: language.to_string(),
            psm: 3,
            binarize: false,
        }
    }

    /// Second-opinion pass: binarized image, single uniform block of text.
    pub fn binarized(command: &str, language: &str) -> Self {
        Self {
            name: "tesseract-binarized".into(),
            command: command.to_string(),
            language: language.to_string(),
            psm: 6,
            binarize: true,
        }
    }

    fn run(&self, image_path: &std::path::Path) -> Result<String, ExtractionError> {
        let output = Command::new(&self.command)
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("tsv")
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ExtractionError::OcrUnavailable(format!(
                    "'{}' not found on PATH",
                    self.command
                )),
                _ => ExtractionError::OcrProcessing(format!("Failed to run {}: {e}", self.command)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::OcrProcessing(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractCli {
    fn name(&self) -> &str {
        &self.name
    }

    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let prepared;
        let bytes = if self.binarize {
            prepared = preprocess_with(
                image_bytes,
                &PreprocessOptions {
                    stretch_contrast: true,
                    binarize: true,
                },
            )?;
            prepared.as_slice()
        } else {
            image_bytes
        };

        let mut file = tempfile::Builder::new()
            .prefix("nutricare-ocr-")
            .suffix(".png")
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;

        let tsv = self.run(file.path())?;
        let (text, word_confidences) = parse_tsv(&tsv);
        let confidence = mean_word_confidence(&word_confidences);

        tracing::debug!(
            engine = %self.name,
            words = word_confidences.len(),
            confidence,
            "Tesseract CLI pass complete"
        );

        Ok(OcrPageResult {
            text,
            confidence,
            word_confidences,
            engine: self.name.clone(),
            fallback_used: false,
        })
    }
}

/// In-process libtesseract.
/// Only available when compiled with the `ocr` feature flag.
#[cfg(feature = "ocr")]
pub struct BundledTesseract {
    tessdata_dir: Option<std::path::PathBuf>,
    language: String,
}

#[cfg(feature = "ocr")]
impl BundledTesseract {
    /// `tessdata_dir` of `None` lets libtesseract use its compiled-in default.
    pub fn new(
        tessdata_dir: Option<&std::path::Path>,
        language: &str,
    ) -> Result<Self, ExtractionError> {
        if let Some(dir) = tessdata_dir {
            if !dir.join("eng.traineddata").exists() {
                return Err(ExtractionError::TessdataNotFound(dir.to_path_buf()));
            }
        }
        Ok(Self {
            tessdata_dir: tessdata_dir.map(|d| d.to_path_buf()),
            language: language.to_string(),
        })
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for BundledTesseract {
    fn name(&self) -> &str {
        "libtesseract"
    }

    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let tessdata = match &self.tessdata_dir {
            Some(dir) => Some(
                dir.to_str()
                    .ok_or_else(|| ExtractionError::OcrInit("Invalid tessdata path".into()))?,
            ),
            None => None,
        };

        let tess = tesseract::Tesseract::new(tessdata, Some(&self.language))
            .map_err(|e| ExtractionError::OcrInit(format!("{e:?}")))?;

        let mut tess = tess
            .set_image_from_mem(image_bytes)
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        let text = tess
            .get_text()
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        let confidence = tess.mean_text_conf().max(0) as f32 / 100.0;

        let word_confidences = match tess.get_tsv_text(0) {
            Ok(tsv) => parse_tsv(&tsv).1,
            Err(_) => text
                .split_whitespace()
                .map(|w| OcrWordResult {
                    text: w.to_string(),
                    confidence,
                })
                .collect(),
        };

        Ok(OcrPageResult {
            text,
            confidence,
            word_confidences,
            engine: self.name().to_string(),
            fallback_used: false,
        })
    }
}

/// Runs the secondary engine when the primary errors or reads below
/// `min_confidence`, and keeps whichever result is better.
pub struct FallbackOcrEngine {
    primary: Box<dyn OcrEngine>,
    secondary: Box<dyn OcrEngine>,
    min_confidence: f32,
}

impl FallbackOcrEngine {
    pub fn new(
        primary: Box<dyn OcrEngine>,
        secondary: Box<dyn OcrEngine>,
        min_confidence: f32,
    ) -> Self {
        Self {
            primary,
            secondary,
            min_confidence,
        }
    }

    fn run_secondary(
        &self,
        image_bytes: &[u8],
        primary: Option<OcrPageResult>,
    ) -> Result<OcrPageResult, ExtractionError> {
        match (self.secondary.ocr_image(image_bytes), primary) {
            (Ok(mut second), Some(first)) => {
                if second.confidence > first.confidence && !second.text.trim().is_empty() {
                    second.fallback_used = true;
                    Ok(second)
                } else {
                    Ok(first)
                }
            }
            (Ok(mut second), None) => {
                second.fallback_used = true;
                Ok(second)
            }
            (Err(e), Some(first)) => {
                tracing::warn!(
                    engine = self.secondary.name(),
                    error = %e,
                    "Secondary OCR failed, keeping primary result"
                );
                Ok(first)
            }
            (Err(e), None) => Err(e),
        }
    }
}

impl OcrEngine for FallbackOcrEngine {
    fn name(&self) -> &str {
        self.primary.name()
    }

    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        match self.primary.ocr_image(image_bytes) {
            Ok(result) if result.confidence >= self.min_confidence => Ok(result),
            Ok(result) => {
                tracing::info!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    confidence = result.confidence,
                    threshold = self.min_confidence,
                    "Primary OCR below confidence threshold, trying secondary"
                );
                self.run_secondary(image_bytes, Some(result))
            }
            Err(e) => {
                tracing::warn!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    error = %e,
                    "Primary OCR failed, trying secondary"
                );
                self.run_secondary(image_bytes, None)
            }
        }
    }
}

/// Build the OCR chain described by the settings.
pub fn build_ocr_engine(settings: &Settings) -> Box<dyn OcrEngine> {
    let cli: Box<dyn OcrEngine> = Box::new(TesseractCli::new(
        &settings.tesseract_cmd,
        &settings.ocr_language,
    ));
    let second = secondary_engine(settings);

    let (primary, secondary) = match settings.ocr_order {
        OcrOrder::CliFirst => (cli, second),
        OcrOrder::BundledFirst => (second, cli),
    };
    tracing::info!(
        primary = primary.name(),
        secondary = secondary.name(),
        "OCR engine chain configured"
    );

    Box::new(FallbackOcrEngine::new(
        primary,
        secondary,
        settings.min_ocr_confidence,
    ))
}

#[cfg(feature = "ocr")]
fn secondary_engine(settings: &Settings) -> Box<dyn OcrEngine> {
    match BundledTesseract::new(None, &settings.ocr_language) {
        Ok(engine) => Box::new(engine),
        Err(e) => {
            tracing::warn!(error = %e, "libtesseract unavailable, using binarized CLI pass");
            Box::new(TesseractCli::binarized(
                &settings.tesseract_cmd,
                &settings.ocr_language,
            ))
        }
    }
}

#[cfg(not(feature = "ocr"))]
fn secondary_engine(settings: &Settings) -> Box<dyn OcrEngine> {
    Box::new(TesseractCli::binarized(
        &settings.tesseract_cmd,
        &settings.ocr_language,
    ))
}

/// Parse Tesseract TSV output into reading-order text and per-word confidences.
/// TSV columns: level page_num block_num par_num line_num word_num left top width height conf text
/// Level 5 = individual word entries. Confidence is 0-100, scaled to 0.0-1.0.
/// Words sharing (page, block, paragraph, line) are joined into one text line.
pub fn parse_tsv(tsv: &str) -> (String, Vec<OcrWordResult>) {
    let mut words = Vec::new();
    let mut lines: BTreeMap<(u32, u32, u32, u32), Vec<String>> = BTreeMap::new();

    for line in tsv.lines().skip(1) {
        // Skip header row
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = match fields[0].parse() {
            Ok(l) => l,
            Err(_) => continue,
        };
        if level != 5 {
            continue;
        }

        let conf: f32 = match fields[10].parse() {
            Ok(c) => c,
            Err(_) => continue,
        };

        let word = fields[11].trim();
        if word.is_empty() {
            continue;
        }

        let key = match (
            fields[1].parse(),
            fields[2].parse(),
            fields[3].parse(),
            fields[4].parse(),
        ) {
            (Ok(page), Ok(block), Ok(par), Ok(line)) => (page, block, par, line),
            _ => continue,
        };

        // Tesseract returns -1 for words it can't assign confidence to
        let confidence = if conf < 0.0 { 0.0 } else { (conf / 100.0).min(1.0) };

        lines.entry(key).or_default().push(word.to_string());
        words.push(OcrWordResult {
            text: word.to_string(),
            confidence,
        });
    }

    let text = lines
        .into_values()
        .map(|w| w.join(" "))
        .collect::<Vec<_>>()
        .join("\n");

    (text, words)
}
