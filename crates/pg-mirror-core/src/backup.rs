//! `pg_dump` stage and the temporary artifact it writes.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use tempfile::TempPath;

use crate::config::SourceConfig;
use crate::errors::{MirrorError, MirrorResult, Stage};
use crate::logger::MirrorLogger;
use crate::process::{CommandRunner, CommandSpec, PASSWORD_ENV};
use crate::system_checks::PG_DUMP;

/// Temporary file holding one custom-format dump.
///
/// The file is removed when the artifact is dropped, which covers early
/// returns and unwinding. [`cleanup`](Self::cleanup) removes it eagerly and
/// reports the outcome.
#[derive(Debug)]
pub struct BackupArtifact {
    path: TempPath,
}

impl BackupArtifact {
    pub fn create_in(dir: &Path, database: &str) -> MirrorResult<Self> {
        let prefix = format!("pg_mirror_{}_", file_safe(database));
        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".dump")
            .tempfile_in(dir)
            .map_err(|err| {
                MirrorError::io(
                    format!("failed to create backup artifact in {}", dir.display()),
                    err,
                )
            })?;
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size on disk, zero when the file is gone.
    pub fn size_bytes(&self) -> u64 {
        fs::metadata(&self.path).map(|meta| meta.len()).unwrap_or(0)
    }

    pub fn cleanup(self, logger: &dyn MirrorLogger) {
        let display = self.path.display().to_string();
        match self.path.close() {
            Ok(()) => logger.debug(format_args!("removed temporary backup {display}")),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                logger.debug(format_args!("temporary backup {display} already removed"))
            }
            Err(err) => logger.warn(format_args!(
                "failed to remove temporary backup {display}: {err}"
            )),
        }
    }
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct BackupOutcome {
    pub bytes: u64,
    pub duration: Duration,
}

/// `pg_dump` invocation writing a custom-format (`-Fc`) archive to `output`.
/// The password travels in the environment only.
pub fn backup_command(source: &SourceConfig, output: &Path) -> CommandSpec {
    let conn = &source.connection;
    CommandSpec::new(PG_DUMP)
        .args(["-h", conn.host.as_str()])
        .args(["-p".to_string(), conn.port.to_string()])
        .args(["-U", conn.user.as_str()])
        .args(["-d", source.database.as_str()])
        .arg("-Fc")
        .arg("--no-password")
        .arg("-f")
        .arg(output.to_string_lossy())
        .env(PASSWORD_ENV, conn.password.as_str())
}

pub fn create_backup(
    runner: &dyn CommandRunner,
    source: &SourceConfig,
    artifact: &BackupArtifact,
    logger: &dyn MirrorLogger,
) -> MirrorResult<BackupOutcome> {
    let command = backup_command(source, artifact.path());
    logger.info(format_args!(
        "Backing up '{}' from {}...",
        source.database,
        source.connection.endpoint()
    ));
    logger.debug(format_args!("running: {command}"));

    let started = Instant::now();
    let result = runner.run(&command)?;
    let duration = started.elapsed();

    if !result.success() {
        logger.error(format_args!("pg_dump failed: {}", result.stderr.trim()));
        return Err(MirrorError::Subprocess {
            stage: Stage::Backup,
            command: command.to_string(),
            code: result.exit_code,
            stderr: result.stderr,
        });
    }

    let bytes = artifact.size_bytes();
    logger.info(format_args!(
        "Backup complete: {:.2} MiB in {:.1?}",
        bytes as f64 / (1024.0 * 1024.0),
        duration
    ));
    Ok(BackupOutcome { bytes, duration })
}
