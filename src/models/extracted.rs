use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ExtractionMethod;

/// Raw text of a report, 1:1 with `MedicalReport` once extraction succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedData {
    pub report_id: Uuid,
    pub raw_text: String,
    pub method: ExtractionMethod,
    /// Name of the extractor or OCR engine that produced the final text.
    pub engine: String,
    pub confidence: f32,
    pub page_count: usize,
    pub word_count: usize,
    pub page_texts: Vec<String>,
    pub sections: Vec<String>,
    pub created_at: NaiveDateTime,
}
