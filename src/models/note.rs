use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::NoteCategory;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextualNote {
    pub id: Uuid,
    pub report_id: Uuid,
    /// Order of the note within the report text.
    pub position: u32,
    pub category: NoteCategory,
    pub section_heading: String,
    pub content: String,
}
