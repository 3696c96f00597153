use std::str::FromStr;

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::ExtractionMethod;
use crate::models::ExtractedData;

pub fn insert_extracted_data(conn: &Connection, data: &ExtractedData) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO extracted_data (report_id, raw_text, method, engine, confidence,
         page_count, word_count, page_texts, sections, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            data.report_id.to_string(),
            data.raw_text,
            data.method.as_str(),
            data.engine,
            data.confidence as f64,
            data.page_count as i64,
            data.word_count as i64,
            serde_json::to_string(&data.page_texts)?,
            serde_json::to_string(&data.sections)?,
            format_datetime(&data.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_extracted_data(
    conn: &Connection,
    report_id: &Uuid,
) -> Result<Option<ExtractedData>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT report_id, raw_text, method, engine, confidence, page_count, word_count,
         page_texts, sections, created_at
         FROM extracted_data WHERE report_id = ?1",
    )?;

    let result = stmt.query_row(params![report_id.to_string()], |row: &Row<'_>| {
        Ok(ExtractedRow {
            report_id: row.get(0)?,
            raw_text: row.get(1)?,
            method: row.get(2)?,
            engine: row.get(3)?,
            confidence: row.get(4)?,
            page_count: row.get(5)?,
            word_count: row.get(6)?,
            page_texts: row.get(7)?,
            sections: row.get(8)?,
            created_at: row.get(9)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(extracted_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn delete_extracted_data(conn: &Connection, report_id: &Uuid) -> Result<usize, DatabaseError> {
    let rows = conn.execute(
        "DELETE FROM extracted_data WHERE report_id = ?1",
        params![report_id.to_string()],
    )?;
    Ok(rows)
}

struct ExtractedRow {
    report_id: String,
    raw_text: String,
    method: String,
    engine: String,
    confidence: f64,
    page_count: i64,
    word_count: i64,
    page_texts: String,
    sections: String,
    created_at: String,
}

fn extracted_from_row(row: ExtractedRow) -> Result<ExtractedData, DatabaseError> {
    Ok(ExtractedData {
        report_id: parse_uuid(&row.report_id)?,
        raw_text: row.raw_text,
        method: ExtractionMethod::from_str(&row.method)?,
        engine: row.engine,
        confidence: row.confidence as f32,
        page_count: row.page_count.max(0) as usize,
        word_count: row.word_count.max(0) as usize,
        page_texts: serde_json::from_str(&row.page_texts)?,
        sections: serde_json::from_str(&row.sections)?,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::test_support::seed_report;

    fn sample(report_id: Uuid) -> ExtractedData {
        ExtractedData {
            report_id,
            raw_text: "HbA1c: 6.1 %\nPage two".into(),
            method: ExtractionMethod::PdfOcr,
            engine: "tesseract-cli".into(),
            confidence: 0.72,
            page_count: 2,
            word_count: 5,
            page_texts: vec!["HbA1c: 6.1 %".into(), "Page two".into()],
            sections: vec!["GENERAL".into(), "LAB RESULTS".into()],
            created_at: chrono::Local::now().naive_local(),
        }
    }

    #[test]
    fn insert_and_get_extracted_data() {
        let conn = open_memory_database().unwrap();
        let report = seed_report(&conn);
        insert_extracted_data(&conn, &sample(report.id)).unwrap();

        let loaded = get_extracted_data(&conn, &report.id).unwrap().unwrap();
        assert_eq!(loaded.method, ExtractionMethod::PdfOcr);
        assert_eq!(loaded.page_texts.len(), 2);
        assert_eq!(loaded.sections[1], "LAB RESULTS");
        assert!((loaded.confidence - 0.72).abs() < 1e-6);
    }

    #[test]
    fn at_most_one_row_per_report() {
        let conn = open_memory_database().unwrap();
        let report = seed_report(&conn);
        insert_extracted_data(&conn, &sample(report.id)).unwrap();
        assert!(insert_extracted_data(&conn, &sample(report.id)).is_err());
    }

    #[test]
    fn delete_removes_row() {
        let conn = open_memory_database().unwrap();
        let report = seed_report(&conn);
        insert_extracted_data(&conn, &sample(report.id)).unwrap();

        assert_eq!(delete_extracted_data(&conn, &report.id).unwrap(), 1);
        assert!(get_extracted_data(&conn, &report.id).unwrap().is_none());
    }
}
