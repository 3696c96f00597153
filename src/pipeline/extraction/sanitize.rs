/// Sanitize extracted text before passing downstream.
///
/// Drops control characters, expands common PDF ligatures, turns exotic
/// spaces into plain ones, collapses runs of horizontal whitespace and
/// removes blank lines. Line structure is kept: the metric and section
/// parsers are line based.
pub fn sanitize_extracted_text(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\r' => {}
            '\n' | '\u{2028}' | '\u{2029}' | '\u{000C}' => cleaned.push('\n'),
            '\t' | '\u{00A0}' | '\u{2007}' | '\u{202F}' | '\u{2009}' => cleaned.push(' '),
            '\u{FB00}' => cleaned.push_str("ff"),
            '\u{FB01}' => cleaned.push_str("fi"),
            '\u{FB02}' => cleaned.push_str("fl"),
            '\u{FB03}' => cleaned.push_str("ffi"),
            '\u{FB04}' => cleaned.push_str("ffl"),
            // Zero-width chars and BOM
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' => {}
            // Replacement char from lossy decoding
            '\u{FFFD}' => {}
            c if c.is_control() => {}
            c => cleaned.push(c),
        }
    }

    cleaned
        .lines()
        .map(collapse_spaces)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_spaces(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-separated token count.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Characters that are not whitespace. Used to decide whether structured
/// PDF text is real content or a scan with an empty text layer.
pub fn non_whitespace_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_null_and_control_characters() {
        let raw = "Dose: 500mg\x01\x02\x03\nPatient: Ravi\x00 Kumar";
        assert_eq!(sanitize_extracted_text(raw), "Dose: 500mg\nPatient: Ravi Kumar");
    }

    #[test]
    fn preserves_medical_punctuation() {
        let raw = "Temp: 37.5°C, BP: 120/80 mmHg (normal) BMI 24.1 kg/m²";
        assert_eq!(sanitize_extracted_text(raw), raw);
    }

    #[test]
    fn removes_blank_lines_and_trims() {
        let raw = "  Line one  \r\n\r\n\n\tLine two\n\n\nLine three   ";
        assert_eq!(sanitize_extracted_text(raw), "Line one\nLine two\nLine three");
    }

    #[test]
    fn collapses_internal_whitespace() {
        let raw = "Glucose\t\t:   110\u{00A0}mg/dL";
        assert_eq!(sanitize_extracted_text(raw), "Glucose : 110 mg/dL");
    }

    #[test]
    fn expands_ligatures_and_drops_zero_width() {
        let raw = "\u{FEFF}Pro\u{FB01}le: e\u{FB00}ective\u{200B}";
        assert_eq!(sanitize_extracted_text(raw), "Profile: effective");
    }

    #[test]
    fn form_feed_splits_lines() {
        assert_eq!(sanitize_extracted_text("page one\u{000C}page two"), "page one\npage two");
    }

    #[test]
    fn only_control_chars_returns_empty() {
        assert_eq!(sanitize_extracted_text("\x00\x01\x02"), "");
        assert_eq!(sanitize_extracted_text(""), "");
    }

    #[test]
    fn keeps_non_latin_text() {
        let raw = "Résultat: élevé, µg/L";
        assert_eq!(sanitize_extracted_text(raw), raw);
    }

    #[test]
    fn counters() {
        assert_eq!(count_words("  HbA1c:  6.1 %\n"), 3);
        assert_eq!(non_whitespace_chars(" a b\n c "), 3);
        assert_eq!(non_whitespace_chars("   \n\t"), 0);
    }
}
