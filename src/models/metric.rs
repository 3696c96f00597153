use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::MetricStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMetric {
    pub id: Uuid,
    pub report_id: Uuid,
    pub metric_key: String,
    pub metric_name: String,
    pub value: f64,
    pub unit: String,
    pub reference_min: Option<f64>,
    pub reference_max: Option<f64>,
    pub status: MetricStatus,
    pub raw_text_snippet: String,
    pub confidence: f32,
}
