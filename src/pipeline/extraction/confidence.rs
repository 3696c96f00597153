use super::types::{ExtractionWarning, OcrPageResult, OcrWordResult, PageExtraction};
use crate::models::enums::ExtractionMethod;

/// Confidence thresholds used by the pipeline
pub mod thresholds {
    /// Below this: extraction likely failed.
    pub const VERY_LOW: f32 = 0.30;

    /// Below this: significant uncertainty. Page gets a warning.
    pub const LOW: f32 = 0.50;

    /// Above this: high confidence.
    pub const HIGH: f32 = 0.85;

    /// Structured text from a digital source.
    pub const VERY_HIGH: f32 = 0.95;

    /// Plain text files are read verbatim.
    pub const PLAIN_TEXT: f32 = 0.99;
}

/// Compute overall document confidence from per-page results
pub fn compute_overall_confidence(pages: &[PageExtraction], method: ExtractionMethod) -> f32 {
    if pages.is_empty() {
        return 0.0;
    }

    match method {
        // Digital PDFs: base 0.95, scaled by ratio of pages with text
        ExtractionMethod::PdfText => {
            let pages_with_text = pages.iter().filter(|p| !p.text.trim().is_empty()).count();
            thresholds::VERY_HIGH * pages_with_text as f32 / pages.len() as f32
        }
        ExtractionMethod::PlainTextRead => thresholds::PLAIN_TEXT,
        // OCR: weighted average by text length
        ExtractionMethod::PdfOcr | ExtractionMethod::ImageOcr => {
            let total_chars: usize = pages.iter().map(|p| p.text.len()).sum();
            if total_chars == 0 {
                return 0.0;
            }
            let weighted_sum: f32 = pages
                .iter()
                .map(|p| p.confidence * p.text.len() as f32)
                .sum();
            weighted_sum / total_chars as f32
        }
    }
}

/// Analyze one OCR'd page and generate warnings
pub fn analyze_ocr_quality(page: usize, result: &OcrPageResult) -> Vec<ExtractionWarning> {
    let mut warnings = Vec::new();

    if result.fallback_used {
        warnings.push(ExtractionWarning::FallbackEngineUsed {
            page,
            engine: result.engine.clone(),
        });
    }

    if result.confidence < thresholds::LOW {
        warnings.push(ExtractionWarning::LowConfidencePage {
            page,
            confidence: result.confidence,
        });
    }
    if result.confidence < thresholds::VERY_LOW {
        warnings.push(ExtractionWarning::BlurryImage { page });
    }

    // Majority of words below 0.40 confidence reads like handwriting
    if !result.word_confidences.is_empty() {
        let low_conf_words = result
            .word_confidences
            .iter()
            .filter(|w| w.confidence < 0.40)
            .count();
        if low_conf_words * 2 > result.word_confidences.len() {
            warnings.push(ExtractionWarning::HandwritingDetected { page });
        }
    }

    warnings
}

/// Mean of word confidences, 0.0 when there are none.
pub fn mean_word_confidence(words: &[OcrWordResult]) -> f32 {
    if words.is_empty() {
        return 0.0;
    }
    words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32
}
