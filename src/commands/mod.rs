//! Command layer behind the CLI.
//!
//! Each command opens what it needs from `CommandContext`, calls into the
//! pipeline or repository, and returns a serializable value or an error
//! message for the user.

pub mod patient;
pub mod report;

use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Settings;
use crate::db::sqlite::open_database;

/// Settings plus an open database connection.
pub struct CommandContext {
    pub settings: Settings,
    pub conn: Connection,
}

impl CommandContext {
    pub fn open(settings: Settings) -> Result<Self, String> {
        let conn = open_database(&settings.database_path).map_err(|e| {
            format!(
                "Database error ({}): {e}",
                settings.database_path.display()
            )
        })?;
        Ok(Self { settings, conn })
    }

    #[cfg(test)]
    pub(crate) fn in_memory(settings: Settings) -> Self {
        let conn = crate::db::sqlite::open_memory_database().unwrap();
        Self { settings, conn }
    }

    pub fn database_path(&self) -> &Path {
        &self.settings.database_path
    }
}

pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("Invalid {what} id: {raw}"))
}

/// Pretty JSON for stdout.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Serialization error: {e}"))
}
