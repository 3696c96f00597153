use std::sync::LazyLock;

use regex::Regex;

use crate::models::enums::MetricStatus;

/// Confidence of a rule match on clean text; scaled by extraction confidence.
pub const RULE_CONFIDENCE: f32 = 0.85;

/// Shape of the value that follows a rule label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// One number with an optional unit.
    Single,
    /// `systolic/diastolic`, emitted as two metrics.
    BloodPressure,
}

/// One recognizable metric.
#[derive(Debug)]
pub struct MetricRule {
    pub key: &'static str,
    pub name: &'static str,
    /// Case-insensitive regex fragment matching the label.
    pub label: &'static str,
    /// Accepted units; the first is the default and the unit of `reference`.
    pub units: &'static [&'static str],
    pub reference: Option<(f64, f64)>,
    pub shape: ValueShape,
}

/// Second metric produced by a blood pressure reading.
#[derive(Debug)]
pub struct CompanionMetric {
    pub key: &'static str,
    pub name: &'static str,
    pub reference: (f64, f64),
}

pub const DIASTOLIC_BP: CompanionMetric = CompanionMetric {
    key: "diastolic_bp",
    name: "Diastolic Blood Pressure",
    reference: (60.0, 80.0),
};

const GLUCOSE_UNITS: &[&str] = &["mg/dL", "mmol/L"];
const LIPID_UNITS: &[&str] = &["mg/dL", "mmol/L"];

/// Rule table. On overlapping labels the longest match wins, then table order.
pub static METRIC_RULES: &[MetricRule] = &[
    MetricRule {
        key: "glucose_postprandial",
        name: "Blood Glucose (Post-Prandial)",
        label: r"(?:post[\s-]?prandial|pp|2\s*hrs?\s+pp|random)\s+(?:blood\s+)?(?:glucose|sugar|bs)|ppbs|rbs",
        units: GLUCOSE_UNITS,
        reference: Some((70.0, 140.0)),
        shape: ValueShape::Single,
    },
    MetricRule {
        key: "glucose",
        name: "Blood Glucose",
        label: r"(?:fasting\s+)?(?:blood\s+|plasma\s+)?(?:glucose|sugar)|fbs|fpg",
        units: GLUCOSE_UNITS,
        reference: Some((70.0, 100.0)),
        shape: ValueShape::Single,
    },
    MetricRule {
        key: "hba1c",
        name: "HbA1c",
        label: r"hb\s*a1c|ha?emoglobin\s+a1c|glycated\s+ha?emoglobin|a1c",
        units: &["%", "mmol/mol"],
        reference: Some((4.0, 5.7)),
        shape: ValueShape::Single,
    },
    MetricRule {
        key: "hdl_cholesterol",
        name: "HDL Cholesterol",
        label: r"hdl(?:[\s-]+cholesterol|-c)?",
        units: LIPID_UNITS,
        reference: Some((40.0, 60.0)),
        shape: ValueShape::Single,
    },
    MetricRule {
        key: "ldl_cholesterol",
        name: "LDL Cholesterol",
        label: r"ldl(?:[\s-]+cholesterol|-c)?",
        units: LIPID_UNITS,
        reference: Some((0.0, 100.0)),
        shape: ValueShape::Single,
    },
    MetricRule {
        key: "total_cholesterol",
        name: "Total Cholesterol",
        label: r"(?:total\s+|serum\s+)?cholesterol",
        units: LIPID_UNITS,
        reference: Some((0.0, 200.0)),
        shape: ValueShape::Single,
    },
    MetricRule {
        key: "triglycerides",
        name: "Triglycerides",
        label: r"(?:serum\s+)?triglycerides?",
        units: LIPID_UNITS,
        reference: Some((0.0, 150.0)),
        shape: ValueShape::Single,
    },
    MetricRule {
        key: "bmi",
        name: "BMI",
        label: r"bmi|body\s+mass\s+index",
        units: &["kg/m²"],
        reference: Some((18.5, 24.9)),
        shape: ValueShape::Single,
    },
    MetricRule {
        key: "systolic_bp",
        name: "Systolic Blood Pressure",
        label: r"blood\s+pressure|bp",
        units: &["mmHg"],
        reference: Some((90.0, 120.0)),
        shape: ValueShape::BloodPressure,
    },
    MetricRule {
        key: "hemoglobin",
        name: "Hemoglobin",
        label: r"ha?emoglobin|hb|hgb",
        units: &["g/dL", "g/L"],
        reference: Some((12.0, 17.5)),
        shape: ValueShape::Single,
    },
    MetricRule {
        key: "creatinine",
        name: "Creatinine",
        label: r"(?:serum\s+)?creatinine",
        units: &["mg/dL", "µmol/L"],
        reference: Some((0.6, 1.2)),
        shape: ValueShape::Single,
    },
    MetricRule {
        key: "uric_acid",
        name: "Uric Acid",
        label: r"(?:serum\s+)?uric\s+acid",
        units: &["mg/dL", "µmol/L"],
        reference: Some((2.4, 7.0)),
        shape: ValueShape::Single,
    },
    MetricRule {
        key: "tsh",
        name: "TSH",
        label: r"tsh|thyroid\s+stimulating\s+hormone",
        units: &["mIU/L", "µIU/mL"],
        reference: Some((0.4, 4.0)),
        shape: ValueShape::Single,
    },
    MetricRule {
        key: "vitamin_d",
        name: "Vitamin D",
        label: r"(?:25[\s-]?(?:oh|hydroxy)\s*)?vitamin\s+d3?|25[\s-]?hydroxyvitamin\s+d",
        units: &["ng/mL", "nmol/L"],
        reference: Some((20.0, 50.0)),
        shape: ValueShape::Single,
    },
    MetricRule {
        key: "vitamin_b12",
        name: "Vitamin B12",
        label: r"vitamin\s+b[\s-]?12|(?:cyano)?cobalamin",
        units: &["pg/mL", "pmol/L"],
        reference: Some((200.0, 900.0)),
        shape: ValueShape::Single,
    },
];

/// Compiled label regex per rule, same order as `METRIC_RULES`.
pub static LABEL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    METRIC_RULES
        .iter()
        .map(|rule| Regex::new(&format!(r"(?i)\b(?:{})\b", rule.label)).unwrap())
        .collect()
});

impl MetricRule {
    pub fn default_unit(&self) -> &'static str {
        self.units[0]
    }

    /// The accepted unit equal to `normalized`, if any.
    pub fn known_unit(&self, normalized: Option<&str>) -> Option<&'static str> {
        normalized.and_then(|u| self.units.iter().find(|known| **known == u).copied())
    }
}

/// Classify a value against a reference range expressed in `range_unit`.
pub fn compute_status(
    value: f64,
    unit: &str,
    range_unit: &str,
    reference: Option<(f64, f64)>,
) -> MetricStatus {
    let Some((min, max)) = reference else {
        return MetricStatus::Unknown;
    };
    if unit != range_unit {
        return MetricStatus::Unknown;
    }

    if value < min * 0.8 {
        MetricStatus::Critical
    } else if value < min {
        MetricStatus::Low
    } else if value > max * 1.5 {
        MetricStatus::Critical
    } else if value > max {
        MetricStatus::High
    } else {
        MetricStatus::Normal
    }
}
