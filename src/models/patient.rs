use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub allergies: Vec<String>,
    pub dietary_preferences: Vec<String>,
    pub created_at: NaiveDateTime,
}

impl Patient {
    pub fn new(full_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            full_name: full_name.trim().to_string(),
            date_of_birth: None,
            gender: None,
            email: None,
            phone: None,
            allergies: vec![],
            dietary_preferences: vec![],
            created_at: chrono::Local::now().naive_local(),
        }
    }
}
