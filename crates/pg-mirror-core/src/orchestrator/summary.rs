use std::path::PathBuf;
use std::time::Duration;

use crate::database::TargetAction;

/// Summary of a successful mirror run.
#[derive(Clone, Debug)]
pub struct MirrorSummary {
    pub database: String,
    pub action: TargetAction,
    /// Where the dump lived. The file no longer exists when the summary is returned.
    pub artifact_path: PathBuf,
    pub artifact_bytes: u64,
    pub backup_duration: Duration,
    pub restore_duration: Duration,
    pub restore_warnings: Option<u32>,
    pub duration: Duration,
}
