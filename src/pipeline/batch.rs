//! Batch runner for reports still waiting in `uploaded`.
//!
//! Each report runs on a blocking task with its own SQLite connection. A
//! semaphore bounds how many run at once. The conditional claim in the
//! processor decides ownership, so overlapping runners never process the
//! same report twice.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use super::processor::{ProcessingError, ReportProcessor};
use crate::db::{open_database, repository};
use crate::models::enums::{FailureKind, ReportStatus};

/// How one report counted in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    Extracted,
    Failed,
    /// Claimed by another runner first.
    Skipped,
}

/// What happened to one report in a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub report_id: Uuid,
    pub outcome: BatchOutcome,
    /// Report status when this runner was done with it.
    pub status: ReportStatus,
    pub failure_kind: Option<FailureKind>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub extracted: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Reports found stuck in `extracting` and moved to `failed`.
    pub recovered: Vec<Uuid>,
    pub items: Vec<BatchItem>,
}

impl BatchSummary {
    fn record(&mut self, item: BatchItem) {
        match item.outcome {
            BatchOutcome::Extracted => self.extracted += 1,
            BatchOutcome::Failed => self.failed += 1,
            BatchOutcome::Skipped => self.skipped += 1,
        }
        self.items.push(item);
    }
}

/// Process every `uploaded` report in the database at `database_path`,
/// oldest first, with at most `jobs` reports in flight.
///
/// Reports claimed more than `stalled_after` ago and still `extracting` are
/// failed first so they can be reprocessed.
pub async fn process_pending(
    processor: Arc<ReportProcessor>,
    database_path: &Path,
    jobs: usize,
    stalled_after: Duration,
) -> Result<BatchSummary, ProcessingError> {
    let (recovered, pending) = {
        let conn = open_database(database_path)?;
        let cutoff = chrono::Duration::from_std(stalled_after)
            .ok()
            .and_then(|window| chrono::Local::now().naive_local().checked_sub_signed(window));
        // No cutoff means the window reaches past any claim that could exist
        let recovered = match cutoff {
            Some(cutoff) => repository::recover_stalled_reports(&conn, cutoff)?,
            None => Vec::new(),
        };
        let pending = repository::get_reports_by_status(&conn, ReportStatus::Uploaded)?;
        (recovered, pending)
    };

    let jobs = jobs.max(1);
    tracing::info!(
        pending = pending.len(),
        recovered = recovered.len(),
        jobs,
        "Starting batch processing"
    );

    let semaphore = Arc::new(Semaphore::new(jobs));
    let mut tasks = JoinSet::new();

    for report in pending {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let processor = Arc::clone(&processor);
        let path: PathBuf = database_path.to_path_buf();

        tasks.spawn_blocking(move || {
            let item = process_one(&processor, &path, report.id);
            drop(permit);
            item
        });
    }

    let mut summary = BatchSummary {
        recovered,
        ..BatchSummary::default()
    };
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(item) => summary.record(item),
            Err(e) => {
                tracing::error!(error = %e, "Batch worker did not finish");
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        extracted = summary.extracted,
        failed = summary.failed,
        skipped = summary.skipped,
        "Batch processing finished"
    );
    Ok(summary)
}

fn process_one(processor: &ReportProcessor, database_path: &Path, report_id: Uuid) -> BatchItem {
    let conn = match open_database(database_path) {
        Ok(conn) => conn,
        Err(e) => return failed_item(report_id, ProcessingError::from(e)),
    };

    let result = catch_unwind(AssertUnwindSafe(|| processor.process_report(&conn, &report_id)));

    match result {
        Ok(Ok(outcome)) => BatchItem {
            report_id,
            outcome: BatchOutcome::Extracted,
            status: outcome.status,
            failure_kind: None,
            error: None,
        },
        Ok(Err(ProcessingError::InvalidTransition { status, .. })) => {
            tracing::debug!(report_id = %report_id, status = status.as_str(), "Report already claimed");
            BatchItem {
                report_id,
                outcome: BatchOutcome::Skipped,
                status,
                failure_kind: None,
                error: None,
            }
        }
        Ok(Err(e)) => failed_item(report_id, e),
        Err(_) => {
            tracing::error!(report_id = %report_id, "Report processing panicked");
            let reason = "Processing panicked";
            if let Err(e) =
                repository::release_interrupted(&conn, &report_id, FailureKind::ExtractionFailed, reason)
            {
                tracing::error!(report_id = %report_id, error = %e, "Could not record panic");
            }
            BatchItem {
                report_id,
                outcome: BatchOutcome::Failed,
                status: ReportStatus::Failed,
                failure_kind: Some(FailureKind::ExtractionFailed),
                error: Some(reason.into()),
            }
        }
    }
}

fn failed_item(report_id: Uuid, error: ProcessingError) -> BatchItem {
    BatchItem {
        report_id,
        outcome: BatchOutcome::Failed,
        status: ReportStatus::Failed,
        failure_kind: error.failure_kind(),
        error: Some(error.to_string()),
    }
}
