use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{
    delete_extracted_data, delete_health_metrics, delete_textual_notes, format_datetime,
    insert_extracted_data, insert_health_metric, insert_textual_note, parse_datetime, parse_uuid,
};
use crate::db::DatabaseError;
use crate::models::enums::{FailureKind, FileCategory, ReportStatus};
use crate::models::{ExtractedData, HealthMetric, MedicalReport, TextualNote};

const REPORT_COLUMNS: &str = "id, patient_id, original_filename, file_path, file_category,
     mime_type, file_size_bytes, content_hash, upload_time, status, failure_kind,
     failure_reason, processed_at, attempts";

pub fn insert_report(conn: &Connection, report: &MedicalReport) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medical_reports (id, patient_id, original_filename, file_path, file_category,
         mime_type, file_size_bytes, content_hash, upload_time, status, failure_kind,
         failure_reason, processed_at, attempts)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            report.id.to_string(),
            report.patient_id.to_string(),
            report.original_filename,
            report.file_path,
            report.file_category.as_str(),
            report.mime_type,
            report.file_size_bytes as i64,
            report.content_hash,
            format_datetime(&report.upload_time),
            report.status.as_str(),
            report.failure_kind.map(|k| k.as_str()),
            report.failure_reason,
            report.processed_at.as_ref().map(format_datetime),
            report.attempts,
        ],
    )?;
    Ok(())
}

pub fn get_report(conn: &Connection, id: &Uuid) -> Result<Option<MedicalReport>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REPORT_COLUMNS} FROM medical_reports WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id.to_string()], report_row);

    match result {
        Ok(row) => Ok(Some(report_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Get a report or fail with `NotFound`.
pub fn require_report(conn: &Connection, id: &Uuid) -> Result<MedicalReport, DatabaseError> {
    get_report(conn, id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "MedicalReport".into(),
        id: id.to_string(),
    })
}

/// All reports of one patient, newest upload first.
pub fn get_reports_by_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<MedicalReport>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REPORT_COLUMNS} FROM medical_reports
         WHERE patient_id = ?1 ORDER BY upload_time DESC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], report_row)?;
    collect_reports(rows)
}

/// Reports in a given status, oldest upload first (processing order).
pub fn get_reports_by_status(
    conn: &Connection,
    status: ReportStatus,
) -> Result<Vec<MedicalReport>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REPORT_COLUMNS} FROM medical_reports
         WHERE status = ?1 ORDER BY upload_time ASC"
    ))?;
    let rows = stmt.query_map(params![status.as_str()], report_row)?;
    collect_reports(rows)
}

/// Same file already uploaded for this patient.
pub fn get_report_by_hash(
    conn: &Connection,
    patient_id: &Uuid,
    content_hash: &str,
) -> Result<Option<MedicalReport>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REPORT_COLUMNS} FROM medical_reports
         WHERE patient_id = ?1 AND content_hash = ?2 LIMIT 1"
    ))?;

    let result = stmt.query_row(params![patient_id.to_string(), content_hash], report_row);

    match result {
        Ok(row) => Ok(Some(report_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Move a report from `from` to `extracting` if, and only if, it is still in `from`.
///
/// Returns `false` when another run owns the row or it is in a different state.
/// The conditional update is what serializes pipeline runs per report.
pub fn claim_report(
    conn: &Connection,
    report_id: &Uuid,
    from: ReportStatus,
) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "UPDATE medical_reports
         SET status = 'extracting', attempts = attempts + 1, claimed_at = ?3,
             failure_kind = NULL, failure_reason = NULL
         WHERE id = ?1 AND status = ?2",
        params![
            report_id.to_string(),
            from.as_str(),
            format_datetime(&chrono::Local::now().naive_local()),
        ],
    )?;
    Ok(rows == 1)
}

/// Atomically replace all extraction output of a report and mark it `extracted`.
///
/// Any previous rows (from an earlier attempt) are removed first so the final
/// state only depends on this run.
pub fn commit_extraction(
    conn: &Connection,
    data: &ExtractedData,
    metrics: &[HealthMetric],
    notes: &[TextualNote],
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    delete_report_outputs(&tx, &data.report_id)?;
    insert_extracted_data(&tx, data)?;
    for metric in metrics {
        insert_health_metric(&tx, metric)?;
    }
    for note in notes {
        insert_textual_note(&tx, note)?;
    }

    let rows = tx.execute(
        "UPDATE medical_reports SET status = 'extracted', processed_at = ?2
         WHERE id = ?1 AND status = 'extracting'",
        params![
            data.report_id.to_string(),
            format_datetime(&chrono::Local::now().naive_local()),
        ],
    )?;
    if rows == 0 {
        // Dropping the transaction rolls back every insert above.
        return Err(DatabaseError::ConstraintViolation(format!(
            "report {} is no longer extracting",
            data.report_id
        )));
    }

    tx.commit()?;
    Ok(())
}

/// Atomically discard all extraction output of a report and mark it `failed`.
pub fn fail_report(
    conn: &Connection,
    report_id: &Uuid,
    kind: FailureKind,
    reason: &str,
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    delete_report_outputs(&tx, report_id)?;
    let rows = tx.execute(
        "UPDATE medical_reports
         SET status = 'failed', failure_kind = ?2, failure_reason = ?3, processed_at = ?4
         WHERE id = ?1",
        params![
            report_id.to_string(),
            kind.as_str(),
            reason,
            format_datetime(&chrono::Local::now().naive_local()),
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "MedicalReport".into(),
            id: report_id.to_string(),
        });
    }

    tx.commit()?;
    Ok(())
}

/// Mark a report `failed` only if it is still `extracting`.
///
/// Used when the run that claimed it can no longer finish. Returns `false`
/// when the report already left `extracting`.
pub fn release_interrupted(
    conn: &Connection,
    report_id: &Uuid,
    kind: FailureKind,
    reason: &str,
) -> Result<bool, DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    let rows = tx.execute(
        "UPDATE medical_reports
         SET status = 'failed', failure_kind = ?2, failure_reason = ?3, processed_at = ?4
         WHERE id = ?1 AND status = 'extracting'",
        params![
            report_id.to_string(),
            kind.as_str(),
            reason,
            format_datetime(&chrono::Local::now().naive_local()),
        ],
    )?;
    if rows == 0 {
        return Ok(false);
    }
    delete_report_outputs(&tx, report_id)?;

    tx.commit()?;
    Ok(true)
}

/// Fail every report claimed before `cutoff` that never left `extracting`.
///
/// Such rows belong to runs that died or could not record their own
/// failure. Returns the ids moved to `failed`, which `reprocess` accepts.
pub fn recover_stalled_reports(
    conn: &Connection,
    cutoff: NaiveDateTime,
) -> Result<Vec<Uuid>, DatabaseError> {
    let stalled = {
        let mut stmt = conn.prepare(
            "SELECT id, claimed_at FROM medical_reports WHERE status = 'extracting'",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?;

        let mut stalled = Vec::new();
        for row in rows {
            let (id, claimed_at) = row?;
            let claimed_at = claimed_at.as_deref().map(parse_datetime).transpose()?;
            if claimed_at.map_or(true, |at| at <= cutoff) {
                stalled.push(parse_uuid(&id)?);
            }
        }
        stalled
    };

    let mut recovered = Vec::new();
    for id in stalled {
        if release_interrupted(conn, &id, FailureKind::ExtractionFailed, "Processing was interrupted")? {
            tracing::warn!(report_id = %id, "Recovered stalled report");
            recovered.push(id);
        }
    }
    Ok(recovered)
}

fn delete_report_outputs(conn: &Connection, report_id: &Uuid) -> Result<(), DatabaseError> {
    delete_textual_notes(conn, report_id)?;
    delete_health_metrics(conn, report_id)?;
    delete_extracted_data(conn, report_id)?;
    Ok(())
}

// Internal row type for MedicalReport mapping
struct ReportRow {
    id: String,
    patient_id: String,
    original_filename: String,
    file_path: String,
    file_category: String,
    mime_type: String,
    file_size_bytes: i64,
    content_hash: String,
    upload_time: String,
    status: String,
    failure_kind: Option<String>,
    failure_reason: Option<String>,
    processed_at: Option<String>,
    attempts: u32,
}

fn report_row(row: &Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        original_filename: row.get(2)?,
        file_path: row.get(3)?,
        file_category: row.get(4)?,
        mime_type: row.get(5)?,
        file_size_bytes: row.get(6)?,
        content_hash: row.get(7)?,
        upload_time: row.get(8)?,
        status: row.get(9)?,
        failure_kind: row.get(10)?,
        failure_reason: row.get(11)?,
        processed_at: row.get(12)?,
        attempts: row.get(13)?,
    })
}

fn collect_reports(
    rows: impl Iterator<Item = rusqlite::Result<ReportRow>>,
) -> Result<Vec<MedicalReport>, DatabaseError> {
    let mut reports = Vec::new();
    for row in rows {
        reports.push(report_from_row(row?)?);
    }
    Ok(reports)
}

fn report_from_row(row: ReportRow) -> Result<MedicalReport, DatabaseError> {
    Ok(MedicalReport {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        original_filename: row.original_filename,
        file_path: row.file_path,
        file_category: FileCategory::from_str(&row.file_category)?,
        mime_type: row.mime_type,
        file_size_bytes: row.file_size_bytes.max(0) as u64,
        content_hash: row.content_hash,
        upload_time: parse_datetime(&row.upload_time)?,
        status: ReportStatus::from_str(&row.status)?,
        failure_kind: row
            .failure_kind
            .as_deref()
            .map(FailureKind::from_str)
            .transpose()?,
        failure_reason: row.failure_reason,
        processed_at: row.processed_at.as_deref().map(parse_datetime).transpose()?,
        attempts: row.attempts,
    })
}
