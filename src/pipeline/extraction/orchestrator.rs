use std::path::Path;

use uuid::Uuid;

use super::confidence::{analyze_ocr_quality, compute_overall_confidence, thresholds};
use super::ocr::build_ocr_engine;
use super::pdf::{inspect_pdf, LopdfTextExtractor, PdfTextExtractor};
use super::pdf_renderer::LopdfImageExtractor;
use super::preprocess::preprocess_for_ocr;
use super::sanitize::{count_words, non_whitespace_chars, sanitize_extracted_text};
use super::types::{
    ExtractionResult, ExtractionWarning, OcrEngine, PageExtraction, PdfExtractor,
    PdfPageRenderer, TextExtractor,
};
use super::ExtractionError;
use crate::config::{Settings, DEFAULT_MIN_TEXT_CHARS};
use crate::models::enums::{ExtractionMethod, FileCategory};
use crate::pipeline::import::format::{file_extension, sniff_category, SNIFF_LEN};

/// Concrete implementation of the text extractor.
/// Uses trait objects for OCR and PDF extraction, enabling dependency injection.
pub struct DocumentExtractor {
    ocr_engine: Box<dyn OcrEngine>,
    /// Tried in order until one yields enough text.
    pdf_extractors: Vec<Box<dyn PdfExtractor>>,
    pdf_renderer: Box<dyn PdfPageRenderer>,
    min_text_chars: usize,
}

/// Text, method and engine label for one file, before sanitisation.
struct RawExtraction {
    method: ExtractionMethod,
    engine: String,
    pages: Vec<PageExtraction>,
}

impl DocumentExtractor {
    pub fn new(
        ocr_engine: Box<dyn OcrEngine>,
        pdf_extractor: Box<dyn PdfExtractor>,
        pdf_renderer: Box<dyn PdfPageRenderer>,
    ) -> Self {
        Self {
            ocr_engine,
            pdf_extractors: vec![pdf_extractor],
            pdf_renderer,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
        }
    }

    /// Structured extractor tried when the previous ones come back short.
    pub fn with_fallback_pdf_extractor(mut self, extractor: Box<dyn PdfExtractor>) -> Self {
        self.pdf_extractors.push(extractor);
        self
    }

    pub fn with_min_text_chars(mut self, min_text_chars: usize) -> Self {
        self.min_text_chars = min_text_chars;
        self
    }

    /// Production wiring: pdf-extract, then lopdf, then OCR of page images.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            build_ocr_engine(settings),
            Box::new(PdfTextExtractor),
            Box::new(LopdfImageExtractor),
        )
        .with_fallback_pdf_extractor(Box::new(LopdfTextExtractor))
        .with_min_text_chars(settings.min_text_chars)
    }

    fn extract_pdf(&self, bytes: &[u8]) -> Result<RawExtraction, ExtractionError> {
        let info = inspect_pdf(bytes)?;

        let structured = self.structured_pdf_text(bytes);
        if let Some((engine, pages)) = &structured {
            if total_chars(pages) >= self.min_text_chars {
                return Ok(RawExtraction {
                    method: ExtractionMethod::PdfText,
                    engine: engine.clone(),
                    pages: pages.clone(),
                });
            }
        }

        tracing::info!(
            pages = info.page_count,
            min_text_chars = self.min_text_chars,
            "PDF has no usable text layer, falling back to OCR"
        );

        let mut engines: Vec<String> = Vec::new();
        let mut pages = Vec::with_capacity(info.page_count);
        for page_number in 1..=info.page_count {
            pages.push(self.ocr_pdf_page(bytes, page_number, &mut engines)?);
        }

        Ok(RawExtraction {
            method: ExtractionMethod::PdfOcr,
            engine: engines.join("+"),
            pages,
        })
    }

    /// Richest structured-text result across the configured extractors.
    fn structured_pdf_text(&self, bytes: &[u8]) -> Option<(String, Vec<PageExtraction>)> {
        let mut best: Option<(String, Vec<PageExtraction>)> = None;

        for extractor in &self.pdf_extractors {
            let pages = match extractor.extract_text(bytes) {
                Ok(pages) => pages,
                Err(e) => {
                    tracing::warn!(extractor = extractor.name(), error = %e, "Structured PDF extraction failed");
                    continue;
                }
            };

            let chars = total_chars(&pages);
            tracing::debug!(extractor = extractor.name(), chars, "Structured PDF extraction");

            if best.as_ref().map_or(true, |(_, b)| chars > total_chars(b)) {
                best = Some((extractor.name().to_string(), pages));
            }
            if chars >= self.min_text_chars {
                break;
            }
        }

        best
    }

    fn ocr_pdf_page(
        &self,
        bytes: &[u8],
        page_number: usize,
        engines: &mut Vec<String>,
    ) -> Result<PageExtraction, ExtractionError> {
        let partial = |reason: String| {
            let mut page = PageExtraction::new(page_number, String::new(), 0.0);
            page.warnings
                .push(ExtractionWarning::PartialExtraction { page: page_number, reason });
            page
        };

        let image = match self.pdf_renderer.render_page(bytes, page_number) {
            Ok(Some(image)) => image,
            Ok(None) => {
                tracing::warn!(page = page_number, "Page has neither text nor an image");
                return Ok(partial("page has no text layer and no image".into()));
            }
            Err(e) => {
                tracing::warn!(page = page_number, error = %e, "Could not extract page image");
                return Ok(partial(e.to_string()));
            }
        };

        let processed = match preprocess_for_ocr(&image) {
            Ok(processed) => processed,
            Err(e) => {
                tracing::warn!(page = page_number, error = %e, "Could not preprocess page image");
                return Ok(partial(e.to_string()));
            }
        };

        let result = self.ocr_engine.ocr_image(&processed)?;
        push_unique(engines, &result.engine);

        let mut page = PageExtraction::new(page_number, result.text.clone(), result.confidence);
        page.warnings = analyze_ocr_quality(page_number, &result);
        Ok(page)
    }

    fn extract_image(&self, bytes: &[u8]) -> Result<RawExtraction, ExtractionError> {
        let processed = preprocess_for_ocr(bytes)?;
        let result = self.ocr_engine.ocr_image(&processed)?;

        let mut page = PageExtraction::new(1, result.text.clone(), result.confidence);
        page.warnings = analyze_ocr_quality(1, &result);

        Ok(RawExtraction {
            method: ExtractionMethod::ImageOcr,
            engine: result.engine,
            pages: vec![page],
        })
    }

    fn extract_plain_text(&self, bytes: Vec<u8>) -> Result<RawExtraction, ExtractionError> {
        let text =
            String::from_utf8(bytes).map_err(|e| ExtractionError::EncodingError(e.to_string()))?;

        Ok(RawExtraction {
            method: ExtractionMethod::PlainTextRead,
            engine: "utf8".into(),
            pages: vec![PageExtraction::new(1, text, thresholds::PLAIN_TEXT)],
        })
    }
}

impl TextExtractor for DocumentExtractor {
    fn extract(
        &self,
        report_id: &Uuid,
        path: &Path,
        declared: FileCategory,
    ) -> Result<ExtractionResult, ExtractionError> {
        tracing::info!(
            report_id = %report_id,
            category = declared.as_str(),
            "Starting text extraction"
        );

        if declared == FileCategory::Unsupported {
            return Err(unsupported(path));
        }

        let bytes = std::fs::read(path)?;
        if bytes.is_empty() {
            return Err(ExtractionError::NoText);
        }

        let detected = sniff_category(&bytes[..bytes.len().min(SNIFF_LEN)]);
        if detected != declared {
            tracing::warn!(
                report_id = %report_id,
                declared = declared.as_str(),
                detected = detected.as_str(),
                "File content does not match declared format"
            );
            return Err(ExtractionError::FormatMismatch { declared, detected });
        }

        let RawExtraction {
            method,
            engine,
            mut pages,
        } = match declared {
            FileCategory::Pdf => self.extract_pdf(&bytes)?,
            FileCategory::Image => self.extract_image(&bytes)?,
            FileCategory::PlainText => self.extract_plain_text(bytes)?,
            FileCategory::Unsupported => return Err(unsupported(path)),
        };

        for page in &mut pages {
            page.text = sanitize_extracted_text(&page.text);
        }

        let full_text = pages
            .iter()
            .map(|p| p.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        if full_text.is_empty() {
            tracing::warn!(report_id = %report_id, method = method.as_str(), "Extraction produced no text");
            return Err(ExtractionError::NoText);
        }

        let overall_confidence = compute_overall_confidence(&pages, method);
        let page_count = pages.len();
        let word_count = count_words(&full_text);

        tracing::info!(
            report_id = %report_id,
            method = method.as_str(),
            engine = %engine,
            pages = page_count,
            words = word_count,
            confidence = overall_confidence,
            "Text extraction complete"
        );

        Ok(ExtractionResult {
            report_id: *report_id,
            method,
            engine,
            pages,
            full_text,
            overall_confidence,
            page_count,
            word_count,
        })
    }
}

fn unsupported(path: &Path) -> ExtractionError {
    ExtractionError::UnsupportedFormat(file_extension(path).unwrap_or_else(|| "unknown".into()))
}

fn total_chars(pages: &[PageExtraction]) -> usize {
    pages.iter().map(|p| non_whitespace_chars(&p.text)).sum()
}

fn push_unique(engines: &mut Vec<String>, name: &str) {
    if !name.is_empty() && !engines.iter().any(|e| e == name) {
        engines.push(name.to_string());
    }
}
