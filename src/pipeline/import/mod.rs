pub mod format;
pub mod hash;
pub mod importer;
pub mod staging;

pub use format::*;
pub use hash::*;
pub use importer::*;
pub use staging::*;

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("File extension not allowed: .{0}")]
    ExtensionNotAllowed(String),

    #[error("File too large: {size_mb:.1}MB exceeds {max_mb:.1}MB limit")]
    FileTooLarge { size_mb: f64, max_mb: f64 },

    #[error("File is empty")]
    EmptyFile,

    #[error("Patient not found: {0}")]
    PatientNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
