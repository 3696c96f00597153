use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{format_datetime, parse_date, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::Patient;

const PATIENT_COLUMNS: &str = "id, full_name, date_of_birth, gender, email, phone,
     allergies, dietary_preferences, created_at";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    if patient.full_name.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "patient full_name must not be empty".into(),
        ));
    }

    conn.execute(
        "INSERT INTO patients (id, full_name, date_of_birth, gender, email, phone,
         allergies, dietary_preferences, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            patient.id.to_string(),
            patient.full_name,
            patient.date_of_birth.map(|d| d.to_string()),
            patient.gender,
            patient.email,
            patient.phone,
            serde_json::to_string(&patient.allergies)?,
            serde_json::to_string(&patient.dietary_preferences)?,
            format_datetime(&patient.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"))?;

    let result = stmt.query_row(params![id.to_string()], patient_row);

    match result {
        Ok(row) => Ok(Some(patient_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY full_name COLLATE NOCASE"
    ))?;

    let rows = stmt.query_map([], patient_row)?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(patient_from_row(row?)?);
    }
    Ok(patients)
}

// Internal row type for Patient mapping
struct PatientRow {
    id: String,
    full_name: String,
    date_of_birth: Option<String>,
    gender: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    allergies: String,
    dietary_preferences: String,
    created_at: String,
}

fn patient_row(row: &Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        full_name: row.get(1)?,
        date_of_birth: row.get(2)?,
        gender: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        allergies: row.get(6)?,
        dietary_preferences: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: parse_uuid(&row.id)?,
        full_name: row.full_name,
        date_of_birth: row.date_of_birth.as_deref().and_then(parse_date),
        gender: row.gender,
        email: row.email,
        phone: row.phone,
        allergies: serde_json::from_str(&row.allergies)?,
        dietary_preferences: serde_json::from_str(&row.dietary_preferences)?,
        created_at: parse_datetime(&row.created_at)?,
    })
}
