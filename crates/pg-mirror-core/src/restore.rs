//! `pg_restore` stage.
//!
//! `pg_restore` exits non-zero whenever it had to skip something, including
//! harmless ownership and ACL noise. A non-zero exit only counts as a failure
//! when stderr carries the literal `ERROR` marker. This is a heuristic: a
//! failure reported without that marker (for example a lowercase
//! `pg_restore: error: connection ... failed`) is read as success. A
//! restore killed by a signal never gets the benefit of the doubt.

use std::path::Path;
use std::time::{Duration, Instant};

use crate::config::ConnectionParams;
use crate::errors::{MirrorError, MirrorResult, Stage};
use crate::logger::MirrorLogger;
use crate::process::{CommandRunner, CommandSpec, ExecutionResult, PASSWORD_ENV};
use crate::system_checks::PG_RESTORE;

pub const FAILURE_MARKER: &str = "ERROR";

const IGNORED_ERRORS_PREFIX: &str = "errors ignored on restore:";
const MAX_REPORTED_ERRORS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreVerdict {
    Clean,
    /// Non-zero exit without the failure marker.
    CompletedWithWarnings { ignored: Option<u32> },
    Failed { error_lines: Vec<String> },
}

impl RestoreVerdict {
    pub fn is_success(&self) -> bool {
        !matches!(self, RestoreVerdict::Failed { .. })
    }
}

/// Classify a finished `pg_restore` run.
pub fn assess(result: &ExecutionResult) -> RestoreVerdict {
    match result.exit_code {
        Some(0) => return RestoreVerdict::Clean,
        Some(_) => {}
        // Killed by a signal: no warnings-only exit to speak of.
        None => {
            return RestoreVerdict::Failed {
                error_lines: vec!["pg_restore was terminated by a signal".to_string()],
            };
        }
    }
    if result.stderr.contains(FAILURE_MARKER) {
        let error_lines = result
            .stderr
            .lines()
            .filter(|line| line.contains(FAILURE_MARKER))
            .map(|line| line.trim().to_string())
            .collect();
        return RestoreVerdict::Failed { error_lines };
    }
    RestoreVerdict::CompletedWithWarnings {
        ignored: ignored_error_count(&result.stderr),
    }
}

/// Parse the trailing `warning: errors ignored on restore: N` summary.
fn ignored_error_count(stderr: &str) -> Option<u32> {
    stderr.lines().rev().find_map(|line| {
        let idx = line.find(IGNORED_ERRORS_PREFIX)?;
        line[idx + IGNORED_ERRORS_PREFIX.len()..].trim().parse().ok()
    })
}

pub fn restore_command(
    target: &ConnectionParams,
    database: &str,
    parallel_jobs: u32,
    artifact: &Path,
) -> CommandSpec {
    CommandSpec::new(PG_RESTORE)
        .args(["-h", target.host.as_str()])
        .args(["-p".to_string(), target.port.to_string()])
        .args(["-U", target.user.as_str()])
        .args(["-d", database])
        .args(["-j".to_string(), parallel_jobs.to_string()])
        .arg("--no-owner")
        .arg("--no-acl")
        .arg("--no-password")
        .arg(artifact.to_string_lossy())
        .env(PASSWORD_ENV, target.password.as_str())
}

#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub verdict: RestoreVerdict,
    pub duration: Duration,
}

impl RestoreOutcome {
    pub fn warnings(&self) -> Option<u32> {
        match self.verdict {
            RestoreVerdict::CompletedWithWarnings { ignored } => ignored,
            _ => None,
        }
    }
}

pub fn restore_backup(
    runner: &dyn CommandRunner,
    target: &ConnectionParams,
    database: &str,
    parallel_jobs: u32,
    artifact: &Path,
    logger: &dyn MirrorLogger,
) -> MirrorResult<RestoreOutcome> {
    let command = restore_command(target, database, parallel_jobs, artifact);
    logger.info(format_args!(
        "Restoring into '{database}' on {} with {parallel_jobs} parallel job(s)...",
        target.endpoint()
    ));
    logger.debug(format_args!("running: {command}"));

    let started = Instant::now();
    let result = runner.run(&command)?;
    let duration = started.elapsed();

    let verdict = assess(&result);
    match &verdict {
        RestoreVerdict::Clean => {
            logger.info(format_args!("Restore complete in {duration:.1?}"));
        }
        RestoreVerdict::CompletedWithWarnings { ignored } => {
            match ignored {
                Some(count) => logger.warn(format_args!(
                    "Restore completed with {count} ignored error(s) \
                     (usually ownership or permission notices)"
                )),
                None => logger.warn(format_args!(
                    "pg_restore exited with status {} but reported no errors; treating as success",
                    result.exit_code.unwrap_or_default()
                )),
            }
            logger.debug(format_args!("pg_restore stderr: {}", result.stderr.trim()));
        }
        RestoreVerdict::Failed { error_lines } => {
            logger.error(format_args!("Restore failed with {} error line(s):", error_lines.len()));
            for line in error_lines.iter().take(MAX_REPORTED_ERRORS) {
                logger.error(format_args!("  {line}"));
            }
            if error_lines.len() > MAX_REPORTED_ERRORS {
                logger.error(format_args!(
                    "  ... and {} more",
                    error_lines.len() - MAX_REPORTED_ERRORS
                ));
            }
            return Err(MirrorError::Subprocess {
                stage: Stage::Restore,
                command: command.to_string(),
                code: result.exit_code,
                stderr: result.stderr,
            });
        }
    }

    Ok(RestoreOutcome { verdict, duration })
}
