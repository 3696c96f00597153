use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ExtractionError;
use crate::models::enums::{ExtractionMethod, FileCategory};

/// Result of text extraction from a single report file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub report_id: Uuid,
    pub method: ExtractionMethod,
    /// Extractor or OCR engine(s) that produced the final text, `+`-joined.
    pub engine: String,
    pub pages: Vec<PageExtraction>,
    pub full_text: String,
    pub overall_confidence: f32,
    pub page_count: usize,
    pub word_count: usize,
}

impl ExtractionResult {
    pub fn warnings(&self) -> impl Iterator<Item = &ExtractionWarning> {
        self.pages.iter().flat_map(|p| p.warnings.iter())
    }
}

/// Per-page extraction result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageExtraction {
    pub page_number: usize,
    pub text: String,
    pub confidence: f32,
    pub warnings: Vec<ExtractionWarning>,
}

impl PageExtraction {
    pub fn new(page_number: usize, text: String, confidence: f32) -> Self {
        Self {
            page_number,
            text,
            confidence,
            warnings: vec![],
        }
    }
}

/// Warnings about extraction quality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionWarning {
    LowConfidencePage { page: usize, confidence: f32 },
    FallbackEngineUsed { page: usize, engine: String },
    BlurryImage { page: usize },
    HandwritingDetected { page: usize },
    PartialExtraction { page: usize, reason: String },
}

/// Raw OCR result from an engine
#[derive(Debug, Clone)]
pub struct OcrPageResult {
    pub text: String,
    /// Mean word confidence, 0.0-1.0.
    pub confidence: f32,
    pub word_confidences: Vec<OcrWordResult>,
    /// Name of the engine that produced this result.
    pub engine: String,
    /// Set when a fallback engine replaced the primary.
    pub fallback_used: bool,
}

/// A single recognized word
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWordResult {
    pub text: String,
    pub confidence: f32,
}

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Recognize text in an encoded image (PNG/JPEG/TIFF/BMP bytes).
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError>;
}

/// Structured PDF text extraction abstraction
pub trait PdfExtractor: Send + Sync {
    fn name(&self) -> &str;

    /// One entry per page, in page order.
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<Vec<PageExtraction>, ExtractionError>;
}

/// Turns a PDF page into an image suitable for OCR.
pub trait PdfPageRenderer: Send + Sync {
    /// PNG bytes for a 1-based page, or `None` when the page carries no image.
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
    ) -> Result<Option<Vec<u8>>, ExtractionError>;
}

/// Main extraction entry point
pub trait TextExtractor: Send + Sync {
    fn extract(
        &self,
        report_id: &Uuid,
        path: &Path,
        declared: FileCategory,
    ) -> Result<ExtractionResult, ExtractionError>;
}
