use crate::models::enums::NoteCategory;

/// Headings that mark a section as clinician-written text.
const NOTE_HEADINGS: &[&str] = &[
    "doctor",
    "physician",
    "note",
    "recommendation",
    "advice",
    "diagnosis",
    "medication",
    "prescription",
    "rx",
    "impression",
    "finding",
    "summary",
    "conclusion",
    "remark",
    "comment",
    "plan",
];

/// Words that make free text read like a clinician's note.
const CLINICIAN_KEYWORDS: &[&str] = &[
    "doctor",
    "physician",
    "dr.",
    "notes",
    "recommend",
    "impression",
    "finding",
    "diagnos",
    "advised",
    "prescri",
    "medication",
    "rx",
    "treatment",
    "follow-up",
    "prognosis",
];

const PRESCRIPTION_KEYWORDS: &[&str] =
    &["rx", "prescri", "medication", "tablet", "capsule", "tab.", "syrup"];
const DIAGNOSIS_KEYWORDS: &[&str] = &["diagnos", "condition"];
const DOCTOR_NOTE_KEYWORDS: &[&str] =
    &["doctor", "physician", "dr.", "advised", "advice", "recommend"];

/// Minimum non-whitespace characters for a section to become a classified note.
pub const MIN_NOTE_CHARS: usize = 20;

/// True when `keyword` starts a word somewhere in `text` (both lowercase).
/// Prefix match, so "diagnos" covers "diagnosis" and "diagnosed".
fn contains_word_prefix(text: &str, keyword: &str) -> bool {
    text.match_indices(keyword).any(|(i, _)| {
        text[..i]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    })
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| contains_word_prefix(text, kw))
}

pub fn is_note_heading(heading: &str) -> bool {
    contains_any(&heading.to_lowercase(), NOTE_HEADINGS)
}

pub fn has_clinician_keyword(content: &str) -> bool {
    contains_any(&content.to_lowercase(), CLINICIAN_KEYWORDS)
}

/// Category of a note from its heading and content.
pub fn classify_note(heading: &str, content: &str) -> NoteCategory {
    let combined = format!("{heading} {content}").to_lowercase();
    if contains_any(&combined, PRESCRIPTION_KEYWORDS) {
        NoteCategory::Prescription
    } else if contains_any(&combined, DIAGNOSIS_KEYWORDS) {
        NoteCategory::Diagnosis
    } else if contains_any(&combined, DOCTOR_NOTE_KEYWORDS) {
        NoteCategory::DoctorNote
    } else {
        NoteCategory::General
    }
}

/// Category for a whole section: classified when it is clinician text of
/// reasonable length, otherwise kept as unstructured.
pub fn section_category(heading: &str, content: &str) -> NoteCategory {
    let long_enough = content.chars().filter(|c| !c.is_whitespace()).count() >= MIN_NOTE_CHARS;
    if long_enough && (is_note_heading(heading) || has_clinician_keyword(content)) {
        classify_note(heading, content)
    } else {
        NoteCategory::Unstructured
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prescription_wins_over_other_signals() {
        assert_eq!(
            classify_note("Doctor's Notes", "Diagnosed with anemia. Rx: Ferrous sulfate tablets"),
            NoteCategory::Prescription
        );
        assert_eq!(
            classify_note("Medications", "Metformin 500 mg twice daily"),
            NoteCategory::Prescription
        );
    }

    #[test]
    fn diagnosis_and_doctor_notes() {
        assert_eq!(
            classify_note("Impression", "Condition consistent with prediabetes"),
            NoteCategory::Diagnosis
        );
        assert_eq!(
            classify_note("", "Patient advised to walk 30 minutes daily"),
            NoteCategory::DoctorNote
        );
        assert_eq!(classify_note("Summary", "Overall stable"), NoteCategory::General);
    }

    #[test]
    fn keywords_match_word_starts_only() {
        // "marx" contains "rx" but not at a word start
        assert!(!contains_word_prefix("marx theory", "rx"));
        assert!(contains_word_prefix("seen by dr. rao", "dr."));
        assert!(contains_word_prefix("diagnosed last year", "diagnos"));
    }

    #[test]
    fn note_headings() {
        assert!(is_note_heading("DOCTOR'S NOTES"));
        assert!(is_note_heading("Recommendations"));
        assert!(is_note_heading("Rx"));
        assert!(!is_note_heading("Lipid Profile"));
    }

    #[test]
    fn short_or_plain_sections_stay_unstructured() {
        assert_eq!(section_category("Recommendations", "Rest."), NoteCategory::Unstructured);
        assert_eq!(
            section_category("Lipid Profile", "Sample collected at 8 am, fasting 12 hours"),
            NoteCategory::Unstructured
        );
        assert_eq!(
            section_category("Summary", "Reduce sugar intake and recheck in 3 months"),
            NoteCategory::General
        );
        assert_eq!(
            section_category("", "Dr. Mehta advised a low carbohydrate diet"),
            NoteCategory::DoctorNote
        );
    }
}
