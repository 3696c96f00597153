use std::str::FromStr;

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::enums::MetricStatus;
use crate::models::HealthMetric;

pub fn insert_health_metric(conn: &Connection, metric: &HealthMetric) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO health_metrics (id, report_id, metric_key, metric_name, value, unit,
         reference_min, reference_max, status, raw_text_snippet, confidence)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            metric.id.to_string(),
            metric.report_id.to_string(),
            metric.metric_key,
            metric.metric_name,
            metric.value,
            metric.unit,
            metric.reference_min,
            metric.reference_max,
            metric.status.as_str(),
            metric.raw_text_snippet,
            metric.confidence as f64,
        ],
    )?;
    Ok(())
}

/// Metrics of a report, ordered by key.
pub fn get_health_metrics(
    conn: &Connection,
    report_id: &Uuid,
) -> Result<Vec<HealthMetric>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, report_id, metric_key, metric_name, value, unit, reference_min,
         reference_max, status, raw_text_snippet, confidence
         FROM health_metrics WHERE report_id = ?1 ORDER BY metric_key",
    )?;

    let rows = stmt.query_map(params![report_id.to_string()], metric_row)?;

    let mut metrics = Vec::new();
    for row in rows {
        metrics.push(metric_from_row(row?)?);
    }
    Ok(metrics)
}

/// Every metric with a given key across one patient's extracted reports,
/// oldest report first. Used for trends over time.
pub fn get_metric_history(
    conn: &Connection,
    patient_id: &Uuid,
    metric_key: &str,
) -> Result<Vec<HealthMetric>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.report_id, m.metric_key, m.metric_name, m.value, m.unit,
         m.reference_min, m.reference_max, m.status, m.raw_text_snippet, m.confidence
         FROM health_metrics m
         JOIN medical_reports r ON r.id = m.report_id
         WHERE r.patient_id = ?1 AND m.metric_key = ?2 AND r.status = 'extracted'
         ORDER BY r.upload_time ASC",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string(), metric_key], metric_row)?;

    let mut metrics = Vec::new();
    for row in rows {
        metrics.push(metric_from_row(row?)?);
    }
    Ok(metrics)
}

pub fn delete_health_metrics(conn: &Connection, report_id: &Uuid) -> Result<usize, DatabaseError> {
    let rows = conn.execute(
        "DELETE FROM health_metrics WHERE report_id = ?1",
        params![report_id.to_string()],
    )?;
    Ok(rows)
}

struct MetricRow {
    id: String,
    report_id: String,
    metric_key: String,
    metric_name: String,
    value: f64,
    unit: String,
    reference_min: Option<f64>,
    reference_max: Option<f64>,
    status: String,
    raw_text_snippet: String,
    confidence: f64,
}

fn metric_row(row: &Row<'_>) -> rusqlite::Result<MetricRow> {
    Ok(MetricRow {
        id: row.get(0)?,
        report_id: row.get(1)?,
        metric_key: row.get(2)?,
        metric_name: row.get(3)?,
        value: row.get(4)?,
        unit: row.get(5)?,
        reference_min: row.get(6)?,
        reference_max: row.get(7)?,
        status: row.get(8)?,
        raw_text_snippet: row.get(9)?,
        confidence: row.get(10)?,
    })
}

fn metric_from_row(row: MetricRow) -> Result<HealthMetric, DatabaseError> {
    Ok(HealthMetric {
        id: parse_uuid(&row.id)?,
        report_id: parse_uuid(&row.report_id)?,
        metric_key: row.metric_key,
        metric_name: row.metric_name,
        value: row.value,
        unit: row.unit,
        reference_min: row.reference_min,
        reference_max: row.reference_max,
        status: MetricStatus::from_str(&row.status)?,
        raw_text_snippet: row.raw_text_snippet,
        confidence: row.confidence as f32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::test_support::seed_report;
    use crate::db::repository::{claim_report, commit_extraction};
    use crate::models::enums::{ExtractionMethod, ReportStatus};
    use crate::models::ExtractedData;

    fn metric(report_id: Uuid, key: &str, value: f64) -> HealthMetric {
        HealthMetric {
            id: Uuid::new_v4(),
            report_id,
            metric_key: key.into(),
            metric_name: key.to_uppercase(),
            value,
            unit: "mg/dL".into(),
            reference_min: None,
            reference_max: Some(200.0),
            status: MetricStatus::Normal,
            raw_text_snippet: format!("{key}: {value}"),
            confidence: 0.8,
        }
    }

    #[test]
    fn insert_and_list_metrics_sorted_by_key() {
        let conn = open_memory_database().unwrap();
        let report = seed_report(&conn);
        insert_health_metric(&conn, &metric(report.id, "triglycerides", 140.0)).unwrap();
        insert_health_metric(&conn, &metric(report.id, "glucose", 92.0)).unwrap();

        let loaded = get_health_metrics(&conn, &report.id).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].metric_key, "glucose");
        assert!(loaded[0].reference_min.is_none());
        assert_eq!(loaded[1].reference_max, Some(200.0));
    }

    #[test]
    fn duplicate_key_per_report_rejected() {
        let conn = open_memory_database().unwrap();
        let report = seed_report(&conn);
        insert_health_metric(&conn, &metric(report.id, "glucose", 92.0)).unwrap();
        assert!(insert_health_metric(&conn, &metric(report.id, "glucose", 95.0)).is_err());
    }

    #[test]
    fn history_only_includes_extracted_reports() {
        let conn = open_memory_database().unwrap();
        let report = seed_report(&conn);
        insert_health_metric(&conn, &metric(report.id, "glucose", 92.0)).unwrap();
        // Report still uploaded: not part of history
        assert!(get_metric_history(&conn, &report.patient_id, "glucose")
            .unwrap()
            .is_empty());

        claim_report(&conn, &report.id, ReportStatus::Uploaded).unwrap();
        let data = ExtractedData {
            report_id: report.id,
            raw_text: "Glucose: 92".into(),
            method: ExtractionMethod::PdfText,
            engine: "pdf-extract".into(),
            confidence: 0.95,
            page_count: 1,
            word_count: 2,
            page_texts: vec![],
            sections: vec![],
            created_at: chrono::Local::now().naive_local(),
        };
        commit_extraction(&conn, &data, &[metric(report.id, "glucose", 92.0)], &[]).unwrap();

        let history = get_metric_history(&conn, &report.patient_id, "glucose").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].value, 92.0);
    }

    #[test]
    fn delete_returns_removed_count() {
        let conn = open_memory_database().unwrap();
        let report = seed_report(&conn);
        insert_health_metric(&conn, &metric(report.id, "glucose", 92.0)).unwrap();
        insert_health_metric(&conn, &metric(report.id, "bmi", 24.1)).unwrap();
        assert_eq!(delete_health_metrics(&conn, &report.id).unwrap(), 2);
    }
}
