use chrono::NaiveDate;

use super::CommandContext;
use crate::db::repository;
use crate::models::Patient;

/// Optional details for a new patient.
#[derive(Debug, Default, Clone)]
pub struct NewPatient {
    pub full_name: String,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub allergies: Vec<String>,
    pub dietary_preferences: Vec<String>,
}

pub fn add_patient(ctx: &CommandContext, input: NewPatient) -> Result<Patient, String> {
    let mut patient = Patient::new(&input.full_name);
    patient.date_of_birth = input
        .date_of_birth
        .as_deref()
        .map(|raw| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|_| format!("Invalid date of birth (expected YYYY-MM-DD): {raw}"))
        })
        .transpose()?;
    patient.gender = input.gender;
    patient.email = input.email;
    patient.phone = input.phone;
    patient.allergies = input.allergies;
    patient.dietary_preferences = input.dietary_preferences;

    repository::insert_patient(&ctx.conn, &patient).map_err(|e| format!("Could not add patient: {e}"))?;
    tracing::info!(patient_id = %patient.id, "Patient added");
    Ok(patient)
}

pub fn list_patients(ctx: &CommandContext) -> Result<Vec<Patient>, String> {
    repository::list_patients(&ctx.conn).map_err(|e| format!("Database error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn add_and_list() {
        let ctx = CommandContext::in_memory(Settings::default());
        let added = add_patient(
            &ctx,
            NewPatient {
                full_name: "  Meera Iyer ".into(),
                date_of_birth: Some("1984-02-29".into()),
                allergies: vec!["penicillin".into()],
                ..NewPatient::default()
            },
        )
        .unwrap();
        assert_eq!(added.full_name, "Meera Iyer");

        let patients = list_patients(&ctx).unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].id, added.id);
        assert_eq!(patients[0].date_of_birth, NaiveDate::from_ymd_opt(1984, 2, 29));
        assert_eq!(patients[0].allergies, vec!["penicillin"]);
    }

    #[test]
    fn bad_birth_date_is_rejected() {
        let ctx = CommandContext::in_memory(Settings::default());
        let err = add_patient(
            &ctx,
            NewPatient {
                full_name: "Meera Iyer".into(),
                date_of_birth: Some("29/02/1984".into()),
                ..NewPatient::default()
            },
        )
        .unwrap_err();
        assert!(err.contains("YYYY-MM-DD"));
        assert!(list_patients(&ctx).unwrap().is_empty());
    }

    #[test]
    fn blank_name_is_rejected() {
        let ctx = CommandContext::in_memory(Settings::default());
        assert!(add_patient(&ctx, NewPatient::default()).is_err());
    }
}
