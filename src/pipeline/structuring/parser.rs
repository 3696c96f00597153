use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::rules::{
    compute_status, MetricRule, ValueShape, DIASTOLIC_BP, LABEL_PATTERNS, METRIC_RULES,
    RULE_CONFIDENCE,
};
use super::types::ParsedMetric;
use super::units::normalize_unit;

const MAX_SNIPPET_CHARS: usize = 120;

/// After a label: optional parenthetical, then a separator or a number.
static CANDIDATE_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\([^)]*\)\s*)?(?:[:=\-–]|[<>≤≥]|\d)").unwrap());

static VALUE_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:\([^)]*\)\s*)?(?:[:=\-–]\s*)?(?:[<>≤≥]=?\s*)?(\d[\d.,]*\d|\d)(?:\s*([%A-Za-zµμ][^\s,;()]*))?",
    )
    .unwrap()
});

static BP_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:\([^)]*\)\s*)?(?:[:=\-–]\s*)?(\d{2,3}(?:\.\d+)?)\s*/\s*(\d{2,3}(?:\.\d+)?)(?:\s*([A-Za-z][^\s,;()]*))?",
    )
    .unwrap()
});

/// `1,200` or `12,500.5`: commas group thousands.
static GROUPED_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9]\d{0,2}(?:,\d{3})+(?:\.\d+)?$").unwrap());

/// `6,1` or `0,85`: a decimal comma.
static DECIMAL_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+,\d{1,2}$").unwrap());

/// What a single line contributed to the metric set
#[derive(Debug, Clone, PartialEq)]
pub enum LineParse {
    /// No rule label followed by a separator or number.
    NoCandidate,
    Candidate {
        metrics: Vec<ParsedMetric>,
        /// A candidate on the line had no usable numeric value or repeated
        /// a metric already seen. The line is kept as an unstructured note.
        rejected: bool,
        /// Text outside the parsed metrics, when the line is not rejected.
        leftover: Option<String>,
    },
}

/// Label spans on a line, longest first at equal start, non-overlapping.
fn label_matches(line: &str) -> Vec<(usize, usize, &'static MetricRule)> {
    let mut found: Vec<(usize, usize, usize)> = LABEL_PATTERNS
        .iter()
        .enumerate()
        .flat_map(|(rule_idx, re)| re.find_iter(line).map(move |m| (m.start(), m.end(), rule_idx)))
        .collect();
    found.sort_by_key(|&(start, end, rule_idx)| (start, Reverse(end - start), rule_idx));

    let mut chosen = Vec::new();
    let mut last_end = 0;
    for (start, end, rule_idx) in found {
        if start < last_end {
            continue;
        }
        chosen.push((start, end, &METRIC_RULES[rule_idx]));
        last_end = end;
    }
    chosen
}

/// Read a captured number. Commas are thousands separators in the grouped
/// form and a decimal mark before one or two digits; any other comma makes
/// the value ambiguous and it is not read.
fn parse_number(raw: &str) -> Option<f64> {
    let normalized = if GROUPED_NUMBER.is_match(raw) {
        raw.replace(',', "")
    } else if DECIMAL_COMMA.is_match(raw) {
        raw.replace(',', ".")
    } else if raw.contains(',') {
        return None;
    } else {
        raw.to_string()
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | ';' | ':' | '|' | '-' | '–' | '/' | '.')
}

/// Text of `line` outside `spans`, if any of it is more than separators.
fn leftover_text(line: &str, spans: &[(usize, usize)]) -> Option<String> {
    let mut pieces = Vec::new();
    let mut cursor = 0;
    for &(start, end) in spans {
        pieces.push(&line[cursor..start]);
        cursor = end;
    }
    pieces.push(&line[cursor..]);

    let text = pieces
        .into_iter()
        .map(|piece| piece.trim_matches(is_separator))
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    text.chars().any(char::is_alphanumeric).then_some(text)
}

fn captured_unit(caps: &Captures<'_>, group: usize) -> Option<String> {
    caps.get(group).map(|m| normalize_unit(m.as_str()))
}

fn snippet(line: &str) -> String {
    line.chars().take(MAX_SNIPPET_CHARS).collect()
}

#[allow(clippy::too_many_arguments)]
fn build_metric(
    key: &str,
    name: &str,
    value: f64,
    unit: &str,
    range_unit: &str,
    reference: Option<(f64, f64)>,
    line: &str,
    confidence: f32,
) -> ParsedMetric {
    ParsedMetric {
        key: key.to_string(),
        name: name.to_string(),
        value,
        unit: unit.to_string(),
        reference_min: reference.map(|(min, _)| min),
        reference_max: reference.map(|(_, max)| max),
        status: compute_status(value, unit, range_unit, reference),
        raw_text_snippet: snippet(line),
        confidence,
    }
}

/// Parse every metric on one line. `seen` holds metric keys already taken
/// by earlier lines; the first occurrence of a key wins.
pub fn parse_metric_line(
    line: &str,
    seen: &mut HashSet<String>,
    extraction_confidence: f32,
) -> LineParse {
    let confidence = RULE_CONFIDENCE * extraction_confidence.clamp(0.0, 1.0);
    let mut metrics = Vec::new();
    let mut candidate = false;
    let mut rejected = false;
    let mut consumed = 0;
    let mut spans = Vec::new();

    for (start, end, rule) in label_matches(line) {
        if start < consumed {
            continue;
        }
        let tail = &line[end..];
        if !CANDIDATE_TAIL.is_match(tail) {
            continue;
        }
        candidate = true;

        if seen.contains(rule.key) {
            tracing::debug!(metric = rule.key, "Repeated metric kept as note");
            rejected = true;
            consumed = end;
            continue;
        }

        let parsed = match rule.shape {
            ValueShape::Single => parse_single(rule, tail, line, confidence),
            ValueShape::BloodPressure => parse_blood_pressure(rule, tail, line, confidence),
        };

        match parsed {
            Some((found, len)) => {
                seen.insert(rule.key.to_string());
                metrics.extend(found);
                consumed = end + len;
                spans.push((start, consumed));
            }
            None => {
                tracing::debug!(metric = rule.key, "Metric label without numeric value");
                rejected = true;
                consumed = end;
            }
        }
    }

    if candidate {
        let leftover = if rejected {
            None
        } else {
            leftover_text(line, &spans)
        };
        LineParse::Candidate {
            metrics,
            rejected,
            leftover,
        }
    } else {
        LineParse::NoCandidate
    }
}

fn parse_single(
    rule: &MetricRule,
    tail: &str,
    line: &str,
    confidence: f32,
) -> Option<(Vec<ParsedMetric>, usize)> {
    let caps = VALUE_TAIL.captures(tail)?;
    let value = parse_number(&caps[1])?;
    let known = rule.known_unit(captured_unit(&caps, 2).as_deref());
    let unit = known.unwrap_or_else(|| rule.default_unit());
    // A word after the number that is not a unit stays on the line
    let len = match known {
        Some(_) => caps.get(0).map_or(0, |m| m.end()),
        None => caps.get(1).map_or(0, |m| m.end()),
    };

    let metric = build_metric(
        rule.key,
        rule.name,
        value,
        unit,
        rule.default_unit(),
        rule.reference,
        line,
        confidence,
    );
    Some((vec![metric], len))
}

fn parse_blood_pressure(
    rule: &MetricRule,
    tail: &str,
    line: &str,
    confidence: f32,
) -> Option<(Vec<ParsedMetric>, usize)> {
    let caps = BP_TAIL.captures(tail)?;
    let systolic = parse_number(&caps[1])?;
    let diastolic = parse_number(&caps[2])?;
    let known = rule.known_unit(captured_unit(&caps, 3).as_deref());
    let unit = known.unwrap_or_else(|| rule.default_unit());
    let len = match known {
        Some(_) => caps.get(0).map_or(0, |m| m.end()),
        None => caps.get(2).map_or(0, |m| m.end()),
    };

    let metrics = vec![
        build_metric(
            rule.key,
            rule.name,
            systolic,
            unit,
            rule.default_unit(),
            rule.reference,
            line,
            confidence,
        ),
        build_metric(
            DIASTOLIC_BP.key,
            DIASTOLIC_BP.name,
            diastolic,
            unit,
            rule.default_unit(),
            Some(DIASTOLIC_BP.reference),
            line,
            confidence,
        ),
    ];
    Some((metrics, len))
}

/// All metrics in a text, first occurrence per key.
pub fn extract_metrics(text: &str, extraction_confidence: f32) -> Vec<ParsedMetric> {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .flat_map(|line| match parse_metric_line(line, &mut seen, extraction_confidence) {
            LineParse::Candidate { metrics, .. } => metrics,
            LineParse::NoCandidate => Vec::new(),
        })
        .collect()
}
