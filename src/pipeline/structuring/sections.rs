use crate::models::enums::NoteCategory;

use super::classify::{is_note_heading, section_category};
use super::types::ParsedNote;

const MAX_HEADING_CHARS: usize = 60;
const MAX_HEADING_WORDS: usize = 6;
const MAX_INLINE_HEADING_WORDS: usize = 4;

fn is_all_caps(text: &str) -> bool {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 3 && letters.iter().all(|c| c.is_uppercase())
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn display_heading(raw: &str) -> String {
    if is_all_caps(raw) {
        title_case(raw)
    } else {
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// A standalone heading line: short, digit-free, and either ALL CAPS or
/// ending with a colon. Returns the display form.
pub fn detect_heading(line: &str) -> Option<String> {
    let line = line.trim();
    let ends_with_colon = line.ends_with(':');
    let head = line.trim_end_matches(':').trim();

    if head.is_empty()
        || head.chars().count() > MAX_HEADING_CHARS
        || head.split_whitespace().count() > MAX_HEADING_WORDS
        || head.chars().any(|c| c.is_ascii_digit())
    {
        return None;
    }
    if !ends_with_colon && !is_all_caps(head) {
        return None;
    }
    Some(display_heading(head))
}

/// `Heading: content` on one line, for known note headings only.
pub fn split_inline_heading(line: &str) -> Option<(String, String)> {
    let (head, rest) = line.split_once(':')?;
    let head = head.trim();
    let rest = rest.trim();

    if head.is_empty()
        || rest.is_empty()
        || head.split_whitespace().count() > MAX_INLINE_HEADING_WORDS
        || head.chars().any(|c| c.is_ascii_digit())
        || !is_note_heading(head)
    {
        return None;
    }
    Some((display_heading(head), rest.to_string()))
}

struct OpenSection {
    heading: String,
    anchor: usize,
    lines: Vec<String>,
}

/// Groups free-text lines under their headings and turns each group into a
/// note. Every note is anchored to a line index so output follows the text.
#[derive(Default)]
pub struct SectionCollector {
    sections: Vec<String>,
    notes: Vec<(usize, ParsedNote)>,
    current: Option<OpenSection>,
}

impl SectionCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_heading(&self) -> String {
        self.current
            .as_ref()
            .map(|s| s.heading.clone())
            .unwrap_or_default()
    }

    fn close(&mut self) {
        let Some(section) = self.current.take() else {
            return;
        };
        if section.lines.is_empty() {
            return;
        }
        let content = section.lines.join("\n");
        let category = section_category(&section.heading, &content);
        self.notes.push((
            section.anchor,
            ParsedNote {
                category,
                section_heading: section.heading,
                content,
            },
        ));
    }

    pub fn start_section(&mut self, index: usize, heading: String) {
        self.close();
        self.sections.push(heading.clone());
        self.current = Some(OpenSection {
            heading,
            anchor: index,
            lines: Vec::new(),
        });
    }

    pub fn push_line(&mut self, index: usize, line: &str) {
        let section = self.current.get_or_insert_with(|| OpenSection {
            heading: String::new(),
            anchor: index,
            lines: Vec::new(),
        });
        section.lines.push(line.to_string());
    }

    /// A metric line that yielded no usable value. Kept verbatim as its own
    /// unstructured note.
    pub fn push_rejected(&mut self, index: usize, line: &str) {
        let heading = self.current_heading();
        self.notes.push((
            index,
            ParsedNote {
                category: NoteCategory::Unstructured,
                section_heading: heading,
                content: line.to_string(),
            },
        ));
    }

    /// Notes in text order and section headings in reading order.
    pub fn finish(mut self) -> (Vec<ParsedNote>, Vec<String>) {
        self.close();
        self.notes.sort_by_key(|(anchor, _)| *anchor);
        let notes = self.notes.into_iter().map(|(_, note)| note).collect();
        (notes, self.sections)
    }
}
