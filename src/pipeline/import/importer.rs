use std::path::Path;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::format::{
    category_from_extension, detect_format, file_extension, mime_for_extension, sanitize_filename,
};
use super::hash::compute_content_hash;
use super::staging::{remove_staged, stage_file};
use super::ImportError;
use crate::config::Settings;
use crate::db::repository;
use crate::models::enums::ReportStatus;
use crate::models::MedicalReport;

/// Upload outcome: a fresh report row, or the report already holding this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "report", rename_all = "snake_case")]
pub enum ImportOutcome {
    Created(MedicalReport),
    Duplicate(MedicalReport),
}

impl ImportOutcome {
    pub fn report(&self) -> &MedicalReport {
        match self {
            Self::Created(report) | Self::Duplicate(report) => report,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Register an uploaded file for a patient.
///
/// Validates extension and size, hashes the content, returns the existing
/// report when this patient already uploaded the same bytes, otherwise copies
/// the file into the upload directory and inserts a report in `uploaded`.
///
/// The stored `file_category` is the category the extension declares; the
/// extractor checks it against the file's magic bytes.
pub fn import_file(
    conn: &Connection,
    settings: &Settings,
    patient_id: &Uuid,
    source_path: &Path,
) -> Result<ImportOutcome, ImportError> {
    let original_filename = sanitize_filename(
        source_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown"),
    );

    tracing::info!(patient_id = %patient_id, file = %original_filename, "Starting report import");

    if repository::get_patient(conn, patient_id)?.is_none() {
        return Err(ImportError::PatientNotFound(*patient_id));
    }

    // Step 1: extension allow-list
    let extension = file_extension(source_path).unwrap_or_default();
    if !settings.is_extension_allowed(&extension) {
        return Err(ImportError::ExtensionNotAllowed(extension));
    }
    let declared = category_from_extension(&extension);
    if !declared.is_supported() {
        return Err(ImportError::UnsupportedFormat(format!(".{extension}")));
    }

    // Step 2: size limits
    let format = detect_format(source_path)?;
    if format.file_size_bytes == 0 {
        return Err(ImportError::EmptyFile);
    }
    if format.file_size_bytes > settings.max_file_size {
        return Err(ImportError::FileTooLarge {
            size_mb: bytes_to_mb(format.file_size_bytes),
            max_mb: bytes_to_mb(settings.max_file_size),
        });
    }
    if format.category != declared {
        // Not rejected here: the pipeline records it as a corrupt file
        tracing::warn!(
            file = %original_filename,
            declared = declared.as_str(),
            detected = format.category.as_str(),
            "File content does not match its extension"
        );
    }

    // Step 3: duplicate detection per patient
    let hash = compute_content_hash(source_path)?;
    if let Some(existing) = repository::get_report_by_hash(conn, patient_id, &hash)? {
        tracing::info!(
            patient_id = %patient_id,
            file = %original_filename,
            duplicate_of = %existing.id,
            "Duplicate report detected"
        );
        return Ok(ImportOutcome::Duplicate(existing));
    }

    // Step 4: stage file
    let report_id = Uuid::new_v4();
    let staged_path = stage_file(source_path, &report_id, &settings.upload_dir)?;

    // Step 5: report row
    let report = MedicalReport {
        id: report_id,
        patient_id: *patient_id,
        original_filename: original_filename.clone(),
        file_path: staged_path.to_string_lossy().to_string(),
        file_category: declared,
        mime_type: mime_for_extension(&extension).to_string(),
        file_size_bytes: format.file_size_bytes,
        content_hash: hash,
        upload_time: chrono::Local::now().naive_local(),
        status: ReportStatus::Uploaded,
        failure_kind: None,
        failure_reason: None,
        processed_at: None,
        attempts: 0,
    };

    if let Err(e) = repository::insert_report(conn, &report) {
        if let Err(cleanup) = remove_staged(&staged_path) {
            tracing::warn!(report_id = %report_id, error = %cleanup, "Failed to remove staged file");
        }
        return Err(e.into());
    }

    tracing::info!(
        report_id = %report_id,
        file = %original_filename,
        category = report.file_category.as_str(),
        size = report.file_size_bytes,
        "Report imported and staged"
    );

    Ok(ImportOutcome::Created(report))
}

fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::test_support::seed_patient;
    use crate::models::enums::FileCategory;
    use std::path::PathBuf;

    struct Fixture {
        _dir: tempfile::TempDir,
        source_dir: PathBuf,
        settings: Settings,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let source_dir = dir.path().join("incoming");
        std::fs::create_dir_all(&source_dir).unwrap();
        let settings = Settings {
            upload_dir: dir.path().join("uploads"),
            ..Settings::default()
        };
        Fixture {
            source_dir,
            settings,
            _dir: dir,
        }
    }

    fn write(fx: &Fixture, name: &str, content: &[u8]) -> PathBuf {
        let path = fx.source_dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn import_creates_uploaded_report() {
        let fx = fixture();
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let path = write(&fx, "labs.txt", b"Glucose: 110 mg/dL");

        let outcome = import_file(&conn, &fx.settings, &patient.id, &path).unwrap();
        assert!(!outcome.is_duplicate());

        let report = outcome.report();
        assert_eq!(report.status, ReportStatus::Uploaded);
        assert_eq!(report.file_category, FileCategory::PlainText);
        assert_eq!(report.mime_type, "text/plain");
        assert_eq!(report.original_filename, "labs.txt");
        assert!(Path::new(&report.file_path).starts_with(&fx.settings.upload_dir));
        assert!(Path::new(&report.file_path).exists());

        let stored = repository::require_report(&conn, &report.id).unwrap();
        assert_eq!(stored.content_hash, report.content_hash);
    }

    #[test]
    fn same_file_twice_is_duplicate() {
        let fx = fixture();
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let first = write(&fx, "a.txt", b"HbA1c: 6.4 %");
        let second = write(&fx, "b.txt", b"HbA1c: 6.4 %");

        let created = import_file(&conn, &fx.settings, &patient.id, &first).unwrap();
        let duplicate = import_file(&conn, &fx.settings, &patient.id, &second).unwrap();

        assert!(duplicate.is_duplicate());
        assert_eq!(duplicate.report().id, created.report().id);
        assert_eq!(
            repository::get_reports_by_patient(&conn, &patient.id).unwrap().len(),
            1
        );
    }

    #[test]
    fn same_file_for_other_patient_is_new_report() {
        let fx = fixture();
        let conn = open_memory_database().unwrap();
        let a = seed_patient(&conn);
        let b = seed_patient(&conn);
        let path = write(&fx, "a.txt", b"BMI: 22");

        import_file(&conn, &fx.settings, &a.id, &path).unwrap();
        let outcome = import_file(&conn, &fx.settings, &b.id, &path).unwrap();
        assert!(!outcome.is_duplicate());
    }

    #[test]
    fn disallowed_extension_rejected() {
        let fx = fixture();
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let path = write(&fx, "report.docx", b"PK\x03\x04");

        assert!(matches!(
            import_file(&conn, &fx.settings, &patient.id, &path),
            Err(ImportError::ExtensionNotAllowed(ext)) if ext == "docx"
        ));
    }

    #[test]
    fn oversized_file_rejected() {
        let mut fx = fixture();
        fx.settings.max_file_size = 8;
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let path = write(&fx, "long.txt", b"Triglycerides: 150 mg/dL");

        assert!(matches!(
            import_file(&conn, &fx.settings, &patient.id, &path),
            Err(ImportError::FileTooLarge { .. })
        ));
        assert!(!fx.settings.upload_dir.exists());
    }

    #[test]
    fn empty_file_rejected() {
        let fx = fixture();
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let path = write(&fx, "empty.pdf", b"");

        assert!(matches!(
            import_file(&conn, &fx.settings, &patient.id, &path),
            Err(ImportError::EmptyFile)
        ));
    }

    #[test]
    fn unknown_patient_rejected() {
        let fx = fixture();
        let conn = open_memory_database().unwrap();
        let path = write(&fx, "a.txt", b"Glucose: 90");

        assert!(matches!(
            import_file(&conn, &fx.settings, &Uuid::new_v4(), &path),
            Err(ImportError::PatientNotFound(_))
        ));
    }

    #[test]
    fn mismatched_content_keeps_declared_category() {
        let fx = fixture();
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let path = write(&fx, "fake.pdf", b"just some text, not a pdf");

        let outcome = import_file(&conn, &fx.settings, &patient.id, &path).unwrap();
        assert_eq!(outcome.report().file_category, FileCategory::Pdf);
    }
}
