use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ImportError;
use crate::models::enums::FileCategory;

/// Result of format detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatDetection {
    pub mime_type: String,
    pub category: FileCategory,
    pub file_size_bytes: u64,
}

/// Number of leading bytes inspected for magic numbers and text heuristics.
pub const SNIFF_LEN: usize = 4096;

/// Detect file format from magic bytes (NOT file extensions).
pub fn detect_format(path: &Path) -> Result<FormatDetection, ImportError> {
    let file_size = std::fs::metadata(path)?.len();

    let mut file = std::fs::File::open(path)?;
    let mut header = vec![0u8; SNIFF_LEN];
    let n = file.read(&mut header)?;
    header.truncate(n);

    let (mime_type, category) = sniff(&header);
    Ok(FormatDetection {
        mime_type: mime_type.to_string(),
        category,
        file_size_bytes: file_size,
    })
}

/// Category implied by the leading bytes of a file.
pub fn sniff_category(header: &[u8]) -> FileCategory {
    sniff(header).1
}

fn sniff(header: &[u8]) -> (&'static str, FileCategory) {
    match header {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => ("application/pdf", FileCategory::Pdf),
        // JPEG: starts with FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => ("image/jpeg", FileCategory::Image),
        // PNG: starts with 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => ("image/png", FileCategory::Image),
        // TIFF: little-endian (49 49 2A 00) or big-endian (4D 4D 00 2A)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => {
            ("image/tiff", FileCategory::Image)
        }
        // BMP: "BM" followed by the file size
        [0x42, 0x4D, _, _, _, _, ..] if !is_likely_text(header) => ("image/bmp", FileCategory::Image),
        _ if is_likely_text(header) => ("text/plain", FileCategory::PlainText),
        _ => ("application/octet-stream", FileCategory::Unsupported),
    }
}

/// Valid UTF-8 (allowing a truncated trailing char), mostly printable.
fn is_likely_text(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }

    let text = match std::str::from_utf8(bytes) {
        Ok(t) => t,
        // The sniff window may cut a multi-byte char in half
        Err(e) if e.error_len().is_none() => match std::str::from_utf8(&bytes[..e.valid_up_to()]) {
            Ok(t) => t,
            Err(_) => return false,
        },
        Err(_) => return false,
    };

    // At least 80% printable characters (or whitespace)
    let total = text.chars().count().max(1);
    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    printable as f64 / total as f64 > 0.80
}

/// Category a file claims through its extension.
pub fn category_from_extension(extension: &str) -> FileCategory {
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "pdf" => FileCategory::Pdf,
        "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" => FileCategory::Image,
        "txt" | "text" => FileCategory::PlainText,
        _ => FileCategory::Unsupported,
    }
}

pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "txt" | "text" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Lowercased extension of a path, without the dot.
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Sanitize a filename: strip path components, limit length
pub fn sanitize_filename(original: &str) -> String {
    let name = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("report");

    let clean: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .take(255)
        .collect();

    if clean.is_empty() {
        "report".to_string()
    } else {
        clean
    }
}
