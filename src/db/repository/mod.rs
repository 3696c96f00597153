//! Repository layer: entity-scoped database operations.
//!
//! All public functions are re-exported here so callers use `db::repository::*`.

mod extracted_data;
mod health_metric;
mod patient;
mod report;
mod textual_note;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use super::DatabaseError;

pub use extracted_data::*;
pub use health_metric::*;
pub use patient::*;
pub use report::*;
pub use textual_note::*;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|e| DatabaseError::ConstraintViolation(format!("bad uuid {value}: {e}")))
}

pub(crate) fn parse_datetime(value: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp {value}: {e}")))
}

pub(crate) fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}
