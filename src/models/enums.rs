use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(ReportStatus {
    Uploaded => "uploaded",
    Extracting => "extracting",
    Extracted => "extracted",
    Failed => "failed",
});

impl ReportStatus {
    /// Terminal states of a single pipeline run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Extracted | Self::Failed)
    }
}

str_enum!(FileCategory {
    Pdf => "pdf",
    Image => "image",
    PlainText => "plain_text",
    Unsupported => "unsupported",
});

impl FileCategory {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

str_enum!(ExtractionMethod {
    PdfText => "pdf_text",
    PdfOcr => "pdf_ocr",
    ImageOcr => "image_ocr",
    PlainTextRead => "plain_text_read",
});

impl ExtractionMethod {
    pub fn used_ocr(&self) -> bool {
        matches!(self, Self::PdfOcr | Self::ImageOcr)
    }
}

str_enum!(MetricStatus {
    Normal => "normal",
    Low => "low",
    High => "high",
    Critical => "critical",
    Unknown => "unknown",
});

impl MetricStatus {
    pub fn is_flagged(&self) -> bool {
        matches!(self, Self::Low | Self::High | Self::Critical)
    }
}

str_enum!(NoteCategory {
    DoctorNote => "doctor_note",
    Prescription => "prescription",
    Diagnosis => "diagnosis",
    General => "general",
    Unstructured => "unstructured",
});

str_enum!(FailureKind {
    UnsupportedFormat => "unsupported_format",
    CorruptFile => "corrupt_file",
    NoTextFound => "no_text_found",
    ExtractionFailed => "extraction_failed",
    StorageFailed => "storage_failed",
});
