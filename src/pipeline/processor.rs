//! Report processing state machine.
//!
//! Drives one report through `uploaded → extracting → extracted | failed`:
//! claim the row, extract text, pull metrics and notes out of it, then
//! commit everything in one transaction. Any error after the claim marks the
//! report `failed` and leaves no extraction rows behind.

use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Settings;
use crate::db::{repository, DatabaseError};
use crate::models::enums::{ExtractionMethod, FailureKind, ReportStatus};
use crate::models::{ExtractedData, HealthMetric, MedicalReport, TextualNote};
use crate::pipeline::extraction::orchestrator::DocumentExtractor;
use crate::pipeline::extraction::types::{ExtractionResult, ExtractionWarning, TextExtractor};
use crate::pipeline::extraction::ExtractionError;
use crate::pipeline::import::importer::{import_file, ImportOutcome};
use crate::pipeline::import::ImportError;
use crate::pipeline::structuring::{structure_text, StructuredReport};

/// Errors that can occur while processing a report.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Import failed: {0}")]
    Import(#[from] ImportError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Storage failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Report not found: {0}")]
    ReportNotFound(Uuid),

    #[error("Cannot {action} report {report_id}: status is {status}")]
    InvalidTransition {
        report_id: Uuid,
        status: ReportStatus,
        action: &'static str,
    },
}

impl ProcessingError {
    /// Failure kind recorded on a report, `None` for caller errors that never
    /// touch a report's state.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Extraction(e) => Some(e.failure_kind()),
            Self::Database(_) => Some(FailureKind::StorageFailed),
            Self::Import(e) => match e {
                ImportError::UnsupportedFormat(_)
                | ImportError::ExtensionNotAllowed(_)
                | ImportError::FileTooLarge { .. } => Some(FailureKind::UnsupportedFormat),
                ImportError::EmptyFile => Some(FailureKind::CorruptFile),
                ImportError::Io(_) => Some(FailureKind::ExtractionFailed),
                ImportError::Database(_) => Some(FailureKind::StorageFailed),
                ImportError::PatientNotFound(_) => None,
            },
            Self::ReportNotFound(_) | Self::InvalidTransition { .. } => None,
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingOutcome {
    pub report_id: Uuid,
    pub status: ReportStatus,
    pub attempt: u32,
    pub method: ExtractionMethod,
    pub engine: String,
    pub confidence: f32,
    pub page_count: usize,
    pub word_count: usize,
    pub metrics_count: usize,
    pub notes_count: usize,
    pub sections: Vec<String>,
    pub warnings: Vec<ExtractionWarning>,
}

/// Result of `process_upload`: the imported report and, unless the upload
/// was a duplicate, the processing summary.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub report: MedicalReport,
    pub duplicate: bool,
    pub processing: Option<ProcessingOutcome>,
}

/// Runs the extraction pipeline for stored reports.
pub struct ReportProcessor {
    extractor: Box<dyn TextExtractor>,
}

impl ReportProcessor {
    pub fn new(extractor: Box<dyn TextExtractor>) -> Self {
        Self { extractor }
    }

    /// Production wiring from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(Box::new(DocumentExtractor::from_settings(settings)))
    }

    /// Process a report that is still `uploaded`.
    pub fn process_report(
        &self,
        conn: &Connection,
        report_id: &Uuid,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        self.run(conn, report_id, ReportStatus::Uploaded, "process")
    }

    /// Explicitly retry a `failed` report.
    pub fn reprocess_report(
        &self,
        conn: &Connection,
        report_id: &Uuid,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        self.run(conn, report_id, ReportStatus::Failed, "reprocess")
    }

    /// Import a file for a patient and process it right away.
    ///
    /// A duplicate upload returns the existing report untouched.
    pub fn process_upload(
        &self,
        conn: &Connection,
        settings: &Settings,
        patient_id: &Uuid,
        source_path: &Path,
    ) -> Result<UploadOutcome, ProcessingError> {
        let report = match import_file(conn, settings, patient_id, source_path)? {
            ImportOutcome::Duplicate(report) => {
                return Ok(UploadOutcome {
                    report,
                    duplicate: true,
                    processing: None,
                });
            }
            ImportOutcome::Created(report) => report,
        };

        let processing = self.process_report(conn, &report.id)?;
        let report = repository::require_report(conn, &report.id)?;

        Ok(UploadOutcome {
            report,
            duplicate: false,
            processing: Some(processing),
        })
    }

    fn run(
        &self,
        conn: &Connection,
        report_id: &Uuid,
        from: ReportStatus,
        action: &'static str,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        let report = repository::get_report(conn, report_id)?
            .ok_or(ProcessingError::ReportNotFound(*report_id))?;

        if !repository::claim_report(conn, report_id, from)? {
            // Re-read: the status may have moved since the first lookup.
            let status = repository::get_report(conn, report_id)?
                .map(|r| r.status)
                .unwrap_or(report.status);
            return Err(ProcessingError::InvalidTransition {
                report_id: *report_id,
                status,
                action,
            });
        }

        let attempt = report.attempts + 1;
        tracing::info!(
            report_id = %report_id,
            attempt,
            action,
            category = report.file_category.as_str(),
            "Report claimed for extraction"
        );

        match self.extract_and_commit(conn, &report, attempt) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let kind = e.failure_kind().unwrap_or(FailureKind::ExtractionFailed);
                tracing::warn!(
                    report_id = %report_id,
                    failure_kind = kind.as_str(),
                    error = %e,
                    "Report processing failed"
                );
                // A report left `extracting` here is picked up by stalled-claim recovery
                if let Err(db_err) = repository::fail_report(conn, report_id, kind, &e.to_string()) {
                    tracing::error!(
                        report_id = %report_id,
                        error = %db_err,
                        "Could not record report failure"
                    );
                }
                Err(e)
            }
        }
    }

    fn extract_and_commit(
        &self,
        conn: &Connection,
        report: &MedicalReport,
        attempt: u32,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        let extraction =
            self.extractor
                .extract(&report.id, Path::new(&report.file_path), report.file_category)?;

        let structured = structure_text(&extraction.full_text, extraction.overall_confidence);

        let data = extracted_data(&extraction, &structured);
        let metrics = health_metrics(&report.id, &structured);
        let notes = textual_notes(&report.id, &structured);

        repository::commit_extraction(conn, &data, &metrics, &notes)?;

        tracing::info!(
            report_id = %report.id,
            method = extraction.method.as_str(),
            metrics = metrics.len(),
            notes = notes.len(),
            "Report extracted"
        );

        Ok(ProcessingOutcome {
            report_id: report.id,
            status: ReportStatus::Extracted,
            attempt,
            method: extraction.method,
            engine: extraction.engine.clone(),
            confidence: extraction.overall_confidence,
            page_count: extraction.page_count,
            word_count: extraction.word_count,
            metrics_count: metrics.len(),
            notes_count: notes.len(),
            sections: structured.sections,
            warnings: extraction.warnings().cloned().collect(),
        })
    }
}

fn extracted_data(extraction: &ExtractionResult, structured: &StructuredReport) -> ExtractedData {
    ExtractedData {
        report_id: extraction.report_id,
        raw_text: extraction.full_text.clone(),
        method: extraction.method,
        engine: extraction.engine.clone(),
        confidence: extraction.overall_confidence,
        page_count: extraction.page_count,
        word_count: extraction.word_count,
        page_texts: extraction.pages.iter().map(|p| p.text.clone()).collect(),
        sections: structured.sections.clone(),
        created_at: chrono::Local::now().naive_local(),
    }
}

fn health_metrics(report_id: &Uuid, structured: &StructuredReport) -> Vec<HealthMetric> {
    structured
        .metrics
        .iter()
        .map(|m| HealthMetric {
            id: Uuid::new_v4(),
            report_id: *report_id,
            metric_key: m.key.clone(),
            metric_name: m.name.clone(),
            value: m.value,
            unit: m.unit.clone(),
            reference_min: m.reference_min,
            reference_max: m.reference_max,
            status: m.status,
            raw_text_snippet: m.raw_text_snippet.clone(),
            confidence: m.confidence,
        })
        .collect()
}

fn textual_notes(report_id: &Uuid, structured: &StructuredReport) -> Vec<TextualNote> {
    structured
        .notes
        .iter()
        .enumerate()
        .map(|(position, n)| TextualNote {
            id: Uuid::new_v4(),
            report_id: *report_id,
            position: position as u32,
            category: n.category,
            section_heading: n.section_heading.clone(),
            content: n.content.clone(),
        })
        .collect()
}
