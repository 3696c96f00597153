use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "NutriCare";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest accepted upload (20 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// Structured PDF text shorter than this (non-whitespace chars) is treated as a scan.
pub const DEFAULT_MIN_TEXT_CHARS: usize = 20;

/// Mean OCR confidence below which the secondary engine is tried.
pub const DEFAULT_MIN_OCR_CONFIDENCE: f32 = 0.60;

/// A report left in `extracting` longer than this (seconds) is treated as
/// an interrupted run and moved to `failed`.
pub const DEFAULT_STALLED_AFTER_SECS: u64 = 30 * 60;

pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] =
    &["pdf", "png", "jpg", "jpeg", "tif", "tiff", "bmp", "txt"];

/// Get the application data directory
/// ~/NutriCare/ on all platforms, falling back to the working directory
/// when no home directory is known.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Where staged report files are copied on upload
pub fn upload_dir() -> PathBuf {
    app_data_dir().join("uploads")
}

pub fn database_path() -> PathBuf {
    app_data_dir().join("nutricare.db")
}

/// Log filter used when `RUST_LOG` is not set
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "nutricare=debug,nutricare_lib=debug,warn"
    } else {
        "nutricare=info,nutricare_lib=info,warn"
    }
}

/// Which OCR engine runs first on images and scanned pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrOrder {
    /// Tesseract CLI first, bundled/binarized pass second.
    CliFirst,
    /// Bundled libtesseract (or binarized CLI pass) first.
    BundledFirst,
}

impl FromStr for OcrOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cli" | "cli_first" | "tesseract" => Ok(Self::CliFirst),
            "bundled" | "bundled_first" => Ok(Self::BundledFirst),
            other => Err(format!("unknown OCR order: {other}")),
        }
    }
}

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub database_path: PathBuf,
    pub max_file_size: u64,
    pub allowed_extensions: Vec<String>,
    pub ocr_order: OcrOrder,
    pub tesseract_cmd: String,
    pub ocr_language: String,
    pub min_text_chars: usize,
    pub min_ocr_confidence: f32,
    pub log_filter: String,
    pub batch_jobs: usize,
    pub stalled_after: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: app_data_dir(),
            upload_dir: upload_dir(),
            database_path: database_path(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            ocr_order: OcrOrder::CliFirst,
            tesseract_cmd: "tesseract".into(),
            ocr_language: "eng".into(),
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            min_ocr_confidence: DEFAULT_MIN_OCR_CONFIDENCE,
            log_filter: default_log_filter().into(),
            batch_jobs: std::thread::available_parallelism()
                .map(|n| n.get().min(4))
                .unwrap_or(2),
            stalled_after: Duration::from_secs(DEFAULT_STALLED_AFTER_SECS),
        }
    }
}

impl Settings {
    /// Defaults overridden by `NUTRICARE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an explicit lookup, so tests do not touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(dir) = lookup("NUTRICARE_DATA_DIR") {
            let dir = PathBuf::from(dir);
            settings.upload_dir = dir.join("uploads");
            settings.database_path = dir.join("nutricare.db");
            settings.data_dir = dir;
        }
        if let Some(dir) = lookup("NUTRICARE_UPLOAD_DIR") {
            settings.upload_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("NUTRICARE_DATABASE") {
            settings.database_path = PathBuf::from(path);
        }
        if let Some(size) = parse_var(&lookup, "NUTRICARE_MAX_FILE_SIZE") {
            settings.max_file_size = size;
        }
        if let Some(list) = lookup("NUTRICARE_ALLOWED_EXTENSIONS") {
            let extensions: Vec<String> = list
                .split(',')
                .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect();
            if !extensions.is_empty() {
                settings.allowed_extensions = extensions;
            }
        }
        if let Some(order) = parse_var(&lookup, "NUTRICARE_OCR_ORDER") {
            settings.ocr_order = order;
        }
        if let Some(cmd) = lookup("NUTRICARE_TESSERACT_CMD") {
            settings.tesseract_cmd = cmd;
        }
        if let Some(lang) = lookup("NUTRICARE_OCR_LANG") {
            settings.ocr_language = lang;
        }
        if let Some(chars) = parse_var(&lookup, "NUTRICARE_MIN_TEXT_CHARS") {
            settings.min_text_chars = chars;
        }
        if let Some(conf) = parse_var::<f32, _>(&lookup, "NUTRICARE_MIN_OCR_CONFIDENCE") {
            settings.min_ocr_confidence = conf.clamp(0.0, 1.0);
        }
        if let Some(filter) = lookup("NUTRICARE_LOG") {
            settings.log_filter = filter;
        }
        if let Some(jobs) = parse_var::<usize, _>(&lookup, "NUTRICARE_BATCH_JOBS") {
            settings.batch_jobs = jobs.max(1);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "NUTRICARE_STALLED_AFTER_SECS") {
            settings.stalled_after = Duration::from_secs(secs);
        }

        settings
    }

    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self.allowed_extensions.iter().any(|e| *e == extension)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("NutriCare"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn defaults_without_env() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(settings.min_text_chars, 20);
        assert_eq!(settings.ocr_order, OcrOrder::CliFirst);
        assert!(settings.batch_jobs >= 1);
        assert!(settings.is_extension_allowed("PDF"));
        assert!(settings.is_extension_allowed(".jpeg"));
        assert!(!settings.is_extension_allowed("docx"));
    }

    #[test]
    fn data_dir_moves_derived_paths() {
        let settings = Settings::from_lookup(lookup_from(&[("NUTRICARE_DATA_DIR", "/srv/nc")]));
        assert_eq!(settings.upload_dir, PathBuf::from("/srv/nc/uploads"));
        assert_eq!(settings.database_path, PathBuf::from("/srv/nc/nutricare.db"));
    }

    #[test]
    fn explicit_paths_win_over_data_dir() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("NUTRICARE_DATA_DIR", "/srv/nc"),
            ("NUTRICARE_DATABASE", "/var/db/reports.db"),
        ]));
        assert_eq!(settings.database_path, PathBuf::from("/var/db/reports.db"));
        assert_eq!(settings.upload_dir, PathBuf::from("/srv/nc/uploads"));
    }

    #[test]
    fn numeric_and_list_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("NUTRICARE_MAX_FILE_SIZE", "1024"),
            ("NUTRICARE_ALLOWED_EXTENSIONS", "pdf, .PNG"),
            ("NUTRICARE_MIN_OCR_CONFIDENCE", "1.7"),
            ("NUTRICARE_BATCH_JOBS", "0"),
            ("NUTRICARE_OCR_ORDER", "bundled"),
            ("NUTRICARE_STALLED_AFTER_SECS", "90"),
        ]));
        assert_eq!(settings.max_file_size, 1024);
        assert_eq!(settings.allowed_extensions, vec!["pdf", "png"]);
        assert_eq!(settings.min_ocr_confidence, 1.0);
        assert_eq!(settings.batch_jobs, 1);
        assert_eq!(settings.ocr_order, OcrOrder::BundledFirst);
        assert_eq!(settings.stalled_after, Duration::from_secs(90));
    }

    #[test]
    fn bad_values_keep_defaults() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("NUTRICARE_MAX_FILE_SIZE", "lots"),
            ("NUTRICARE_OCR_ORDER", "cloud"),
        ]));
        assert_eq!(settings.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(settings.ocr_order, OcrOrder::CliFirst);
    }
}
