pub mod confidence;
pub mod ocr;
pub mod orchestrator;
pub mod pdf;
pub mod pdf_renderer;
pub mod preprocess;
pub mod sanitize;
pub mod types;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use confidence::*;
pub use ocr::*;
pub use orchestrator::*;
pub use pdf::*;
pub use pdf_renderer::*;
pub use preprocess::*;
pub use sanitize::*;
pub use types::*;

use std::path::PathBuf;

use thiserror::Error;

use crate::models::enums::{FailureKind, FileCategory};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported format for extraction: {0}")]
    UnsupportedFormat(String),

    #[error("File content ({detected}) does not match declared format ({declared})")]
    FormatMismatch {
        declared: FileCategory,
        detected: FileCategory,
    },

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF is password-protected")]
    EncryptedPdf,

    #[error("Image could not be decoded: {0}")]
    ImageDecode(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Text encoding error: {0}")]
    EncodingError(String),

    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    #[error("Tesseract OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Tessdata not found at: {0}")]
    TessdataNotFound(PathBuf),

    #[error("No text found in document")]
    NoText,
}

impl ExtractionError {
    /// Failure kind recorded on the report when this error ends a run.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::UnsupportedFormat(_) => FailureKind::UnsupportedFormat,
            Self::FormatMismatch { .. }
            | Self::PdfParsing(_)
            | Self::EncryptedPdf
            | Self::ImageDecode(_)
            | Self::EncodingError(_) => FailureKind::CorruptFile,
            Self::NoText => FailureKind::NoTextFound,
            Self::Io(_)
            | Self::ImageProcessing(_)
            | Self::OcrUnavailable(_)
            | Self::OcrInit(_)
            | Self::OcrProcessing(_)
            | Self::TessdataNotFound(_) => FailureKind::ExtractionFailed,
        }
    }
}
