use std::panic::{self, AssertUnwindSafe};

use lopdf::Document;

use super::confidence::thresholds;
use super::sanitize::non_whitespace_chars;
use super::types::{PageExtraction, PdfExtractor};
use super::ExtractionError;

/// Structural facts about a PDF, read before any text extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInfo {
    pub page_count: usize,
}

/// Parse the document and reject what no extractor can read:
/// unparseable bytes, encrypted documents, zero pages.
pub fn inspect_pdf(pdf_bytes: &[u8]) -> Result<PdfInfo, ExtractionError> {
    let doc = Document::load_mem(pdf_bytes)
        .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;

    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(ExtractionError::EncryptedPdf);
    }

    let page_count = doc.get_pages().len();
    if page_count == 0 {
        return Err(ExtractionError::PdfParsing("PDF has no pages".into()));
    }

    Ok(PdfInfo { page_count })
}

fn page_from_text(page_number: usize, text: String) -> PageExtraction {
    let confidence = if non_whitespace_chars(&text) > 10 {
        thresholds::VERY_HIGH
    } else {
        0.0
    };
    PageExtraction::new(page_number, text, confidence)
}

/// PDF text extractor using the pdf-extract crate.
/// Handles digital PDFs with embedded text layers.
pub struct PdfTextExtractor;

impl PdfExtractor for PdfTextExtractor {
    fn name(&self) -> &str {
        "pdf-extract"
    }

    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<Vec<PageExtraction>, ExtractionError> {
        // pdf-extract panics on some malformed fonts and content streams
        let page_texts = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
        }))
        .map_err(|_| ExtractionError::PdfParsing("pdf-extract panicked".into()))?
        .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;

        Ok(page_texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| page_from_text(i + 1, text))
            .collect())
    }
}

/// Secondary structured extractor: lopdf's own content-stream text decoding.
pub struct LopdfTextExtractor;

impl PdfExtractor for LopdfTextExtractor {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<Vec<PageExtraction>, ExtractionError> {
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;

        let pages = doc
            .get_pages()
            .keys()
            .enumerate()
            .map(|(i, &page_no)| {
                // Undecodable pages come back empty and may still be OCR'd
                let text = doc.extract_text(&[page_no]).unwrap_or_else(|e| {
                    tracing::debug!(page = page_no, error = %e, "lopdf could not decode page text");
                    String::new()
                });
                page_from_text(i + 1, text)
            })
            .collect();

        Ok(pages)
    }
}
