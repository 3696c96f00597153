use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::enums::NoteCategory;
use crate::models::TextualNote;

pub fn insert_textual_note(conn: &Connection, note: &TextualNote) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO textual_notes (id, report_id, position, category, section_heading, content)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            note.id.to_string(),
            note.report_id.to_string(),
            note.position,
            note.category.as_str(),
            note.section_heading,
            note.content,
        ],
    )?;
    Ok(())
}

/// Notes of a report in document order.
pub fn get_textual_notes(
    conn: &Connection,
    report_id: &Uuid,
) -> Result<Vec<TextualNote>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, report_id, position, category, section_heading, content
         FROM textual_notes WHERE report_id = ?1 ORDER BY position",
    )?;

    let rows = stmt.query_map(params![report_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, u32>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut notes = Vec::new();
    for row in rows {
        let (id, report_id, position, category, section_heading, content) = row?;
        notes.push(TextualNote {
            id: parse_uuid(&id)?,
            report_id: parse_uuid(&report_id)?,
            position,
            category: NoteCategory::from_str(&category)?,
            section_heading,
            content,
        });
    }
    Ok(notes)
}

pub fn delete_textual_notes(conn: &Connection, report_id: &Uuid) -> Result<usize, DatabaseError> {
    let rows = conn.execute(
        "DELETE FROM textual_notes WHERE report_id = ?1",
        params![report_id.to_string()],
    )?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::test_support::seed_report;

    fn note(report_id: Uuid, position: u32, category: NoteCategory, content: &str) -> TextualNote {
        TextualNote {
            id: Uuid::new_v4(),
            report_id,
            position,
            category,
            section_heading: "Remarks".into(),
            content: content.into(),
        }
    }

    #[test]
    fn notes_come_back_in_position_order() {
        let conn = open_memory_database().unwrap();
        let report = seed_report(&conn);
        insert_textual_note(&conn, &note(report.id, 2, NoteCategory::Unstructured, "third"))
            .unwrap();
        insert_textual_note(&conn, &note(report.id, 0, NoteCategory::Diagnosis, "first")).unwrap();
        insert_textual_note(&conn, &note(report.id, 1, NoteCategory::Prescription, "second"))
            .unwrap();

        let loaded = get_textual_notes(&conn, &report.id).unwrap();
        let contents: Vec<&str> = loaded.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(loaded[0].category, NoteCategory::Diagnosis);
    }

    #[test]
    fn delete_clears_report_notes() {
        let conn = open_memory_database().unwrap();
        let report = seed_report(&conn);
        insert_textual_note(&conn, &note(report.id, 0, NoteCategory::General, "a")).unwrap();
        assert_eq!(delete_textual_notes(&conn, &report.id).unwrap(), 1);
        assert!(get_textual_notes(&conn, &report.id).unwrap().is_empty());
    }
}
