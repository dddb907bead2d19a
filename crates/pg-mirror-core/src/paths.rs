//! Location of pg-mirror's per-user state. Today that is only the run
//! history file.

use std::path::PathBuf;

use directories::{BaseDirs, ProjectDirs};
use eyre::{eyre, Result};
use once_cell::sync::OnceCell;

const FALLBACK_DIR: &str = ".pg_mirror";

static PINNED_DIR: OnceCell<PathBuf> = OnceCell::new();

/// Pin the directory for the rest of the process (`--config-dir`).
/// Only the first call takes effect; later calls return `false`.
pub fn set_config_dir(path: impl Into<PathBuf>) -> bool {
    PINNED_DIR.set(path.into()).is_ok()
}

/// The pinned directory, else the platform config dir for `pg-mirror`,
/// else `~/.pg_mirror`.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = PINNED_DIR.get() {
        return Ok(dir.clone());
    }
    ProjectDirs::from("", "", "pg-mirror")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .or_else(|| BaseDirs::new().map(|base| base.home_dir().join(FALLBACK_DIR)))
        .ok_or_else(|| eyre!("no home directory to keep pg-mirror state in; pass --config-dir"))
}
