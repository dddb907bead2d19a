use crate::config::MirrorConfig;
use crate::errors::MirrorError;
use crate::history::{HistoryRecord, HistoryStore, RunStatus};
use crate::logger::MirrorLogger;

use super::RunProgress;

pub(super) fn record_run_history(
    store: Option<&HistoryStore>,
    config: &MirrorConfig,
    progress: &RunProgress,
    error: Option<&MirrorError>,
    logger: &dyn MirrorLogger,
) {
    let Some(store) = store else {
        return;
    };

    let status = if error.is_some() {
        RunStatus::Failed
    } else {
        RunStatus::Succeeded
    };
    let mut record = HistoryRecord::new(config, status);
    record.action = progress.action;
    record.artifact_bytes = progress.artifact_bytes;
    record.backup_duration_ms = progress.backup_duration.as_millis();
    record.restore_duration_ms = progress.restore_duration.as_millis();
    record.restore_warnings = progress.restore_warnings;
    record.error = error.map(|err| err.to_string());

    if let Err(err) = store.append(&record) {
        logger.warn(format_args!("Failed to update run history: {err:?}"));
    }
}
