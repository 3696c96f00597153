use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{FailureKind, FileCategory, ReportStatus};

/// An uploaded medical report and its position in the processing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalReport {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub original_filename: String,
    pub file_path: String,
    pub file_category: FileCategory,
    pub mime_type: String,
    pub file_size_bytes: u64,
    pub content_hash: String,
    pub upload_time: NaiveDateTime,
    pub status: ReportStatus,
    pub failure_kind: Option<FailureKind>,
    pub failure_reason: Option<String>,
    pub processed_at: Option<NaiveDateTime>,
    pub attempts: u32,
}
