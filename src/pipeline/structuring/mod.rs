pub mod classify;
pub mod parser;
pub mod rules;
pub mod sections;
pub mod types;
pub mod units;

pub use classify::*;
pub use parser::*;
pub use types::*;
pub use units::normalize_unit;

use std::collections::HashSet;

use sections::{detect_heading, split_inline_heading, SectionCollector};

/// Turn extracted report text into metrics, notes and section headings.
///
/// Each non-empty line is tried as a metric line first. Lines that carry a
/// metric label but no usable value become unstructured notes, and text next
/// to a parsed metric stays in the current section. Everything else is
/// grouped under the nearest heading, so no text is dropped.
pub fn structure_text(text: &str, extraction_confidence: f32) -> StructuredReport {
    let mut seen = HashSet::new();
    let mut metrics = Vec::new();
    let mut collector = SectionCollector::new();

    for (index, line) in text.lines().map(str::trim).enumerate() {
        if line.is_empty() {
            continue;
        }

        match parse_metric_line(line, &mut seen, extraction_confidence) {
            LineParse::Candidate {
                metrics: found,
                rejected,
                leftover,
            } => {
                metrics.extend(found);
                if rejected {
                    collector.push_rejected(index, line);
                } else if let Some(rest) = leftover {
                    collector.push_line(index, &rest);
                }
                continue;
            }
            LineParse::NoCandidate => {}
        }

        if let Some(heading) = detect_heading(line) {
            collector.start_section(index, heading);
        } else if let Some((heading, content)) = split_inline_heading(line) {
            collector.start_section(index, heading);
            collector.push_line(index, &content);
        } else {
            collector.push_line(index, line);
        }
    }

    let (notes, sections) = collector.finish();
    tracing::debug!(
        metrics = metrics.len(),
        notes = notes.len(),
        sections = sections.len(),
        "Structured report text"
    );

    StructuredReport {
        metrics,
        notes,
        sections,
    }
}
