use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::ImportError;

/// Copy an uploaded file into the upload directory as `<report_id>.<ext>`.
/// Returns the staged path.
pub fn stage_file(
    source_path: &Path,
    report_id: &Uuid,
    upload_dir: &Path,
) -> Result<PathBuf, ImportError> {
    let extension = source_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".into());

    std::fs::create_dir_all(upload_dir)?;

    let target_path = upload_dir.join(format!("{report_id}.{extension}"));
    let size = std::fs::copy(source_path, &target_path)?;

    tracing::debug!(
        report_id = %report_id,
        size,
        path = %target_path.display(),
        "File staged"
    );

    Ok(target_path)
}

/// Remove a staged file (if import is rolled back). Missing files are fine.
pub fn remove_staged(staged_path: &Path) -> Result<(), ImportError> {
    match std::fs::remove_file(staged_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
