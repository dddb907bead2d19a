//! Local run history.
//!
//! Records one summarized line per mirror run to a capped JSONL file under
//! the user's config directory. Nothing leaves the machine; passwords are
//! never recorded. Set `PG_MIRROR_DISABLE_HISTORY=1` to turn it off.

use std::collections::VecDeque;
use std::env;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::config::MirrorConfig;
use crate::database::TargetAction;
use crate::paths::config_dir;

const DEFAULT_MAX_BYTES: u64 = 1_000_000;
const DISABLE_ENV: &str = "PG_MIRROR_DISABLE_HISTORY";
const HISTORY_FILE: &str = "history.jsonl";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// One finished mirror run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp_epoch_ms: u128,
    pub database: String,
    pub source: String,
    pub target: String,
    pub parallel_jobs: u32,
    pub drop_existing: bool,
    pub action: Option<TargetAction>,
    pub artifact_bytes: u64,
    pub backup_duration_ms: u128,
    pub restore_duration_ms: u128,
    pub restore_warnings: Option<u32>,
    pub status: RunStatus,
    pub error: Option<String>,
}

impl HistoryRecord {
    pub fn new(config: &MirrorConfig, status: RunStatus) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let options = config.options();
        Self {
            timestamp_epoch_ms: now.as_millis(),
            database: config.database().to_string(),
            source: config.source().connection.endpoint(),
            target: config.target().connection.endpoint(),
            parallel_jobs: options.parallel_jobs,
            drop_existing: options.drop_existing,
            action: None,
            artifact_bytes: 0,
            backup_duration_ms: 0,
            restore_duration_ms: 0,
            restore_warnings: None,
            status,
            error: None,
        }
    }

    pub fn timestamp(&self) -> SystemTime {
        let millis = self.timestamp_epoch_ms.min(u64::MAX as u128) as u64;
        UNIX_EPOCH + Duration::from_millis(millis)
    }
}

/// JSONL file of [`HistoryRecord`]s, oldest first, kept under `max_bytes`
/// by dropping the oldest runs.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    max_bytes: u64,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    /// Store under the resolved config directory.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(config_dir()?.join(HISTORY_FILE)))
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one finished run. While the file stays under the cap the line
    /// is appended in place; otherwise the file is rewritten without its
    /// oldest runs. The newest run is always kept.
    pub fn append(&self, record: &HistoryRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create history directory {}", parent.display())
            })?;
        }

        let line = serde_json::to_string(record).context("serialize history record")?;
        let current_len = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == ErrorKind::NotFound => 0,
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to stat history file {}", self.path.display())
                })
            }
        };

        if current_len + line.len() as u64 + 1 <= self.max_bytes {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .with_context(|| {
                    format!("failed to open history file {}", self.path.display())
                })?;
            return writeln!(file, "{line}").context("write history record");
        }

        let mut lines: VecDeque<String> = self
            .load()?
            .iter()
            .map(serde_json::to_string)
            .collect::<serde_json::Result<_>>()
            .context("serialize history record")?;
        lines.push_back(line);

        let mut total: u64 = lines.iter().map(|l| l.len() as u64 + 1).sum();
        while total > self.max_bytes && lines.len() > 1 {
            if let Some(oldest) = lines.pop_front() {
                total -= oldest.len() as u64 + 1;
            }
        }
        self.rewrite(lines.iter().map(String::as_str))
    }

    /// Most recent `limit` runs, oldest first. `0` returns everything.
    pub fn read_recent(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        let mut records = self.load()?;
        if limit > 0 && records.len() > limit {
            records.drain(..records.len() - limit);
        }
        Ok(records)
    }

    /// Remove the history file. Returns whether there was one.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove history file {}", self.path.display())),
        }
    }

    /// Every readable record. Lines that are not a record (hand edits, a
    /// run cut off mid-write) are skipped.
    fn load(&self) -> Result<Vec<HistoryRecord>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read history file {}", self.path.display())
                })
            }
        };
        Ok(contents
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    /// Replace the file through a sibling temp file so readers never see a
    /// half-written history.
    fn rewrite<'l>(&self, lines: impl Iterator<Item = &'l str>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir).context("stage history rewrite")?;
        for line in lines {
            writeln!(staged, "{line}").context("stage history rewrite")?;
        }
        staged
            .persist(&self.path)
            .with_context(|| format!("failed to replace history file {}", self.path.display()))?;
        Ok(())
    }
}

pub fn history_disabled() -> bool {
    env::var(DISABLE_ENV)
        .map(|val| val == "1" || val.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MirrorConfig {
        MirrorConfig::from_json_str(
            r#"{
                "source": {"host": "prod", "database": "shop", "user": "u", "password": "secret-a"},
                "target": {"host": "staging", "port": 6543, "user": "u", "password": "secret-b"}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("nested").join(HISTORY_FILE));
        assert!(store.read_recent(10).unwrap().is_empty());

        let mut record = HistoryRecord::new(&config(), RunStatus::Succeeded);
        record.action = Some(TargetAction::Create);
        record.artifact_bytes = 42;
        store.append(&record).unwrap();
        store
            .append(&HistoryRecord::new(&config(), RunStatus::Failed))
            .unwrap();

        let records = store.read_recent(0).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].target, "staging:6543");
        assert_eq!(records[0].action, Some(TargetAction::Create));
        assert_eq!(records[1].status, RunStatus::Failed);
        assert_eq!(store.read_recent(1).unwrap()[0].status, RunStatus::Failed);

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("secret-a"));
        assert!(!raw.contains("secret-b"));
    }

    #[test]
    fn skips_garbage_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join(HISTORY_FILE));
        store
            .append(&HistoryRecord::new(&config(), RunStatus::Succeeded))
            .unwrap();
        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file).unwrap();
        assert_eq!(store.read_recent(0).unwrap().len(), 1);
    }

    #[test]
    fn size_cap_keeps_newest_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join(HISTORY_FILE)).with_max_bytes(600);
        for i in 0..10 {
            let mut record = HistoryRecord::new(&config(), RunStatus::Succeeded);
            record.artifact_bytes = i;
            store.append(&record).unwrap();
        }
        let records = store.read_recent(0).unwrap();
        assert!(records.len() < 10);
        assert_eq!(records.last().unwrap().artifact_bytes, 9);
        assert!(fs::metadata(store.path()).unwrap().len() <= 600);
    }

    #[test]
    fn newest_run_survives_a_cap_smaller_than_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join(HISTORY_FILE)).with_max_bytes(10);
        store
            .append(&HistoryRecord::new(&config(), RunStatus::Succeeded))
            .unwrap();
        let mut failed = HistoryRecord::new(&config(), RunStatus::Failed);
        failed.error = Some("backup failed".into());
        store.append(&failed).unwrap();

        let records = store.read_recent(0).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, RunStatus::Failed);
        assert_eq!(records[0].error.as_deref(), Some("backup failed"));
    }

    #[test]
    fn clear_reports_whether_a_file_existed() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join(HISTORY_FILE));
        assert!(!store.clear().unwrap());
        store
            .append(&HistoryRecord::new(&config(), RunStatus::Succeeded))
            .unwrap();
        assert!(store.clear().unwrap());
        assert!(!store.path().exists());
    }
}
