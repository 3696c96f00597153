use serde::{Deserialize, Serialize};

use crate::models::enums::{MetricStatus, NoteCategory};

/// Metrics, notes and section headings pulled out of one report's text
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredReport {
    pub metrics: Vec<ParsedMetric>,
    pub notes: Vec<ParsedNote>,
    /// Section headings in reading order.
    pub sections: Vec<String>,
}

/// A numeric health metric recognized by a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedMetric {
    pub key: String,
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub reference_min: Option<f64>,
    pub reference_max: Option<f64>,
    pub status: MetricStatus,
    /// Source line, truncated.
    pub raw_text_snippet: String,
    pub confidence: f32,
}

/// A block of free text, classified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedNote {
    pub category: NoteCategory,
    pub section_heading: String,
    pub content: String,
}
