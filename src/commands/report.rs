use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use super::{parse_id, CommandContext};
use crate::db::repository;
use crate::models::enums::ReportStatus;
use crate::models::{ExtractedData, HealthMetric, MedicalReport, TextualNote};
use crate::pipeline::batch::{process_pending, BatchSummary};
use crate::pipeline::import::importer::{import_file, ImportOutcome};
use crate::pipeline::processor::{ProcessingOutcome, ReportProcessor, UploadOutcome};

/// Everything stored for one report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDetail {
    pub report: MedicalReport,
    pub extracted: Option<ExtractedData>,
    pub metrics: Vec<HealthMetric>,
    pub notes: Vec<TextualNote>,
}

fn check_source(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Err(format!("File not found: {}", path.display()));
    }
    if !path.is_file() {
        return Err(format!("Path is not a regular file: {}", path.display()));
    }
    Ok(())
}

/// Register a file for a patient without processing it.
pub fn upload_report(
    ctx: &CommandContext,
    patient_id: &str,
    path: &Path,
) -> Result<ImportOutcome, String> {
    check_source(path)?;
    let patient_id = parse_id(patient_id, "patient")?;
    import_file(&ctx.conn, &ctx.settings, &patient_id, path).map_err(|e| format!("Upload failed: {e}"))
}

/// Register a file and run the pipeline on it.
pub fn upload_and_process(
    ctx: &CommandContext,
    processor: &ReportProcessor,
    patient_id: &str,
    path: &Path,
) -> Result<UploadOutcome, String> {
    check_source(path)?;
    let patient_id = parse_id(patient_id, "patient")?;
    processor
        .process_upload(&ctx.conn, &ctx.settings, &patient_id, path)
        .map_err(|e| format!("Upload failed: {e}"))
}

pub fn process_report(
    ctx: &CommandContext,
    processor: &ReportProcessor,
    report_id: &str,
) -> Result<ProcessingOutcome, String> {
    let report_id = parse_id(report_id, "report")?;
    processor
        .process_report(&ctx.conn, &report_id)
        .map_err(|e| format!("Processing failed: {e}"))
}

pub fn reprocess_report(
    ctx: &CommandContext,
    processor: &ReportProcessor,
    report_id: &str,
) -> Result<ProcessingOutcome, String> {
    let report_id = parse_id(report_id, "report")?;
    processor
        .reprocess_report(&ctx.conn, &report_id)
        .map_err(|e| format!("Reprocessing failed: {e}"))
}

pub async fn process_pending_reports(
    ctx: &CommandContext,
    processor: Arc<ReportProcessor>,
    jobs: Option<usize>,
) -> Result<BatchSummary, String> {
    let jobs = jobs.unwrap_or(ctx.settings.batch_jobs);
    process_pending(processor, ctx.database_path(), jobs, ctx.settings.stalled_after)
        .await
        .map_err(|e| format!("Batch processing failed: {e}"))
}

/// Fail reports stuck in `extracting` for longer than `older_than`
/// (default from settings) so they can be reprocessed.
pub fn recover_stalled(
    ctx: &CommandContext,
    older_than: Option<Duration>,
) -> Result<Vec<Uuid>, String> {
    let window = older_than.unwrap_or(ctx.settings.stalled_after);
    let cutoff = chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| chrono::Local::now().naive_local().checked_sub_signed(window))
        .ok_or_else(|| format!("Recovery window too large: {}s", window.as_secs()))?;
    repository::recover_stalled_reports(&ctx.conn, cutoff).map_err(|e| format!("Database error: {e}"))
}

/// Reports filtered by patient and/or status. Without a patient, `status`
/// defaults to listing every state.
pub fn list_reports(
    ctx: &CommandContext,
    patient_id: Option<&str>,
    status: Option<&str>,
) -> Result<Vec<MedicalReport>, String> {
    let status = status
        .map(|s| ReportStatus::from_str(s.trim()).map_err(|e| e.to_string()))
        .transpose()?;
    let db_err = |e: crate::db::DatabaseError| format!("Database error: {e}");

    let mut reports = match patient_id {
        Some(raw) => {
            let patient_id = parse_id(raw, "patient")?;
            repository::get_reports_by_patient(&ctx.conn, &patient_id).map_err(db_err)?
        }
        None => {
            let statuses = match status {
                Some(status) => vec![status],
                None => vec![
                    ReportStatus::Uploaded,
                    ReportStatus::Extracting,
                    ReportStatus::Extracted,
                    ReportStatus::Failed,
                ],
            };
            let mut all = Vec::new();
            for status in statuses {
                all.extend(repository::get_reports_by_status(&ctx.conn, status).map_err(db_err)?);
            }
            all.sort_by_key(|r| r.upload_time);
            all
        }
    };

    if let Some(status) = status {
        reports.retain(|r| r.status == status);
    }
    Ok(reports)
}

pub fn show_report(ctx: &CommandContext, report_id: &str) -> Result<ReportDetail, String> {
    let report_id = parse_id(report_id, "report")?;
    let db_err = |e: crate::db::DatabaseError| format!("Database error: {e}");

    let report = repository::get_report(&ctx.conn, &report_id)
        .map_err(db_err)?
        .ok_or_else(|| format!("Report not found: {report_id}"))?;

    Ok(ReportDetail {
        extracted: repository::get_extracted_data(&ctx.conn, &report_id).map_err(db_err)?,
        metrics: repository::get_health_metrics(&ctx.conn, &report_id).map_err(db_err)?,
        notes: repository::get_textual_notes(&ctx.conn, &report_id).map_err(db_err)?,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::patient::{add_patient, NewPatient};
    use crate::config::Settings;
    use crate::pipeline::extraction::ocr::testing::PanickingOcrEngine;
    use crate::pipeline::extraction::orchestrator::DocumentExtractor;
    use crate::pipeline::extraction::pdf::PdfTextExtractor;
    use crate::pipeline::extraction::pdf_renderer::LopdfImageExtractor;

    struct Env {
        dir: tempfile::TempDir,
        ctx: CommandContext,
        patient_id: String,
    }

    fn env() -> Env {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            upload_dir: dir.path().join("uploads"),
            database_path: dir.path().join("nutricare.db"),
            ..Settings::default()
        };
        let ctx = CommandContext::open(settings).unwrap();
        let patient = add_patient(
            &ctx,
            NewPatient {
                full_name: "Kiran Das".into(),
                ..NewPatient::default()
            },
        )
        .unwrap();
        Env {
            dir,
            ctx,
            patient_id: patient.id.to_string(),
        }
    }

    fn text_processor() -> ReportProcessor {
        ReportProcessor::new(Box::new(DocumentExtractor::new(
            Box::new(PanickingOcrEngine),
            Box::new(PdfTextExtractor),
            Box::new(LopdfImageExtractor),
        )))
    }

    impl Env {
        fn file(&self, name: &str, text: &str) -> std::path::PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, text).unwrap();
            path
        }
    }

    #[test]
    fn upload_then_process_then_show() {
        let env = env();
        let path = env.file("lipids.txt", "LDL Cholesterol: 162 mg/dL\nTriglycerides: 180 mg/dL");

        let upload = upload_report(&env.ctx, &env.patient_id, &path).unwrap();
        let id = upload.report().id.to_string();
        assert_eq!(upload.report().status, ReportStatus::Uploaded);

        let outcome = process_report(&env.ctx, &text_processor(), &id).unwrap();
        assert_eq!(outcome.metrics_count, 2);

        let detail = show_report(&env.ctx, &id).unwrap();
        assert_eq!(detail.report.status, ReportStatus::Extracted);
        assert!(detail.extracted.is_some());
        let keys: Vec<_> = detail.metrics.iter().map(|m| m.metric_key.as_str()).collect();
        assert_eq!(keys, ["ldl_cholesterol", "triglycerides"]);
        assert!(detail.notes.is_empty());
    }

    #[test]
    fn reprocess_requires_failed_report() {
        let env = env();
        let path = env.file("bp.txt", "BP: 118/76 mmHg");
        let upload = upload_report(&env.ctx, &env.patient_id, &path).unwrap();

        let err = reprocess_report(&env.ctx, &text_processor(), &upload.report().id.to_string())
            .unwrap_err();
        assert!(err.contains("status is uploaded"), "{err}");
    }

    #[test]
    fn upload_errors_are_messages() {
        let env = env();
        let missing = env.dir.path().join("missing.txt");
        assert!(upload_report(&env.ctx, &env.patient_id, &missing)
            .unwrap_err()
            .starts_with("File not found"));

        let path = env.file("ok.txt", "TSH: 2.0 mIU/L");
        assert!(upload_report(&env.ctx, "not-a-uuid", &path)
            .unwrap_err()
            .starts_with("Invalid patient id"));
    }

    #[test]
    fn list_filters_by_patient_and_status() {
        let env = env();
        let processor = text_processor();
        let a = env.file("a.txt", "Glucose: 98 mg/dL");
        let b = env.file("b.txt", "Hemoglobin: 11.2 g/dL");
        upload_and_process(&env.ctx, &processor, &env.patient_id, &a).unwrap();
        upload_report(&env.ctx, &env.patient_id, &b).unwrap();

        assert_eq!(list_reports(&env.ctx, None, None).unwrap().len(), 2);
        assert_eq!(list_reports(&env.ctx, Some(&env.patient_id), None).unwrap().len(), 2);
        let extracted = list_reports(&env.ctx, None, Some("extracted")).unwrap();
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].original_filename, "a.txt");
        assert_eq!(
            list_reports(&env.ctx, Some(&env.patient_id), Some("uploaded")).unwrap().len(),
            1
        );
        assert!(list_reports(&env.ctx, None, Some("done")).is_err());
    }

    #[tokio::test]
    async fn pending_reports_run_in_batch() {
        let env = env();
        let a = env.file("a.txt", "Vitamin D: 14 ng/mL");
        let b = env.file("b.txt", "Vitamin B12: 640 pg/mL");
        upload_report(&env.ctx, &env.patient_id, &a).unwrap();
        upload_report(&env.ctx, &env.patient_id, &b).unwrap();

        let summary = process_pending_reports(&env.ctx, Arc::new(text_processor()), Some(2))
            .await
            .unwrap();
        assert_eq!(summary.extracted, 2);
        assert!(list_reports(&env.ctx, None, Some("uploaded")).unwrap().is_empty());
    }

    #[test]
    fn stuck_report_can_be_recovered_then_reprocessed() {
        let env = env();
        let path = env.file("vitd.txt", "Vitamin D: 12 ng/mL");
        let id = upload_report(&env.ctx, &env.patient_id, &path).unwrap().report().id;
        repository::claim_report(&env.ctx.conn, &id, ReportStatus::Uploaded).unwrap();

        let err = reprocess_report(&env.ctx, &text_processor(), &id.to_string()).unwrap_err();
        assert!(err.contains("status is extracting"), "{err}");

        assert!(recover_stalled(&env.ctx, None).unwrap().is_empty());
        assert_eq!(recover_stalled(&env.ctx, Some(Duration::ZERO)).unwrap(), vec![id]);

        let outcome = reprocess_report(&env.ctx, &text_processor(), &id.to_string()).unwrap();
        assert_eq!(outcome.status, ReportStatus::Extracted);
    }
}
