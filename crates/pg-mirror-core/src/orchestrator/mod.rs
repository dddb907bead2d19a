//! Linear mirror pipeline: config -> tool check -> backup -> target
//! preparation -> restore -> artifact cleanup -> history.

use std::env;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::backup::{create_backup, BackupArtifact};
use crate::config::{ConfigOverrides, MirrorConfig};
use crate::database::{DatabaseManager, TargetAction};
use crate::errors::MirrorResult;
use crate::history::HistoryStore;
use crate::logger::MirrorLogger;
use crate::process::CommandRunner;
use crate::restore::restore_backup;
use crate::system_checks::SystemChecker;

mod history;
mod options;
mod summary;

pub use options::RunOptions;
pub use summary::MirrorSummary;

use history::record_run_history;

const RULE: &str = "============================================================";

/// What the stages have produced so far; feeds the history record on both
/// success and failure.
#[derive(Debug, Default)]
struct RunProgress {
    action: Option<TargetAction>,
    artifact_bytes: u64,
    backup_duration: Duration,
    restore_duration: Duration,
    restore_warnings: Option<u32>,
}

pub struct MirrorOrchestrator<'a> {
    runner: &'a dyn CommandRunner,
    logger: &'a dyn MirrorLogger,
    checker: SystemChecker,
    history: Option<HistoryStore>,
}

impl<'a> MirrorOrchestrator<'a> {
    pub fn new(runner: &'a dyn CommandRunner, logger: &'a dyn MirrorLogger) -> Self {
        Self {
            runner,
            logger,
            checker: SystemChecker::new(),
            history: None,
        }
    }

    pub fn with_checker(mut self, checker: SystemChecker) -> Self {
        self.checker = checker;
        self
    }

    pub fn with_history(mut self, history: Option<HistoryStore>) -> Self {
        self.history = history;
        self
    }

    /// Load the config at `config_path`, apply `overrides`, then [`run`](Self::run).
    /// A bad config fails here, before any subprocess is started.
    pub fn mirror_from_file(
        &self,
        config_path: &Path,
        overrides: &ConfigOverrides,
        options: &RunOptions,
    ) -> MirrorResult<MirrorSummary> {
        let config = MirrorConfig::load(config_path)
            .and_then(|config| config.with_overrides(overrides))
            .inspect_err(|err| {
                self.logger.error(format_args!(
                    "Could not load configuration {}: {err}",
                    config_path.display()
                ))
            })?;
        self.run(&config, options)
    }

    pub fn run(&self, config: &MirrorConfig, options: &RunOptions) -> MirrorResult<MirrorSummary> {
        let started = Instant::now();
        self.log_banner(config);

        let mut progress = RunProgress::default();
        let outcome = self.run_stages(config, options, &mut progress);

        match outcome {
            Ok(artifact_path) => {
                record_run_history(self.history.as_ref(), config, &progress, None, self.logger);
                self.logger.info(format_args!("{RULE}"));
                self.logger.info(format_args!("Mirror of '{}' completed", config.database()));
                self.logger.info(format_args!("{RULE}"));
                Ok(MirrorSummary {
                    database: config.database().to_string(),
                    action: progress.action.unwrap_or(TargetAction::Reuse),
                    artifact_path,
                    artifact_bytes: progress.artifact_bytes,
                    backup_duration: progress.backup_duration,
                    restore_duration: progress.restore_duration,
                    restore_warnings: progress.restore_warnings,
                    duration: started.elapsed(),
                })
            }
            Err(err) => {
                record_run_history(
                    self.history.as_ref(),
                    config,
                    &progress,
                    Some(&err),
                    self.logger,
                );
                self.logger.error(format_args!("{RULE}"));
                self.logger.error(format_args!(
                    "Mirror of '{}' aborted ({} error): {err}",
                    config.database(),
                    err.category()
                ));
                self.logger.error(format_args!("{RULE}"));
                Err(err)
            }
        }
    }

    fn log_banner(&self, config: &MirrorConfig) {
        let options = config.options();
        self.logger.info(format_args!("{RULE}"));
        self.logger.info(format_args!(
            "Source       : {} @ {}",
            config.database(),
            config.source().connection.endpoint()
        ));
        self.logger.info(format_args!(
            "Target       : {} @ {}",
            config.database(),
            config.target().connection.endpoint()
        ));
        self.logger.info(format_args!("Parallel jobs: {}", options.parallel_jobs));
        self.logger.info(format_args!("Drop existing: {}", options.drop_existing));
        self.logger.info(format_args!("{RULE}"));
    }

    /// Run every stage. The artifact is cleaned up before this returns,
    /// whichever way it returns; the drop guard covers unwinding.
    fn run_stages(
        &self,
        config: &MirrorConfig,
        options: &RunOptions,
        progress: &mut RunProgress,
    ) -> MirrorResult<PathBuf> {
        if options.skip_checks {
            self.logger.debug(format_args!("skipping PostgreSQL tool check"));
        } else {
            self.logger.info(format_args!("Checking PostgreSQL client tools..."));
            self.checker.verify(self.runner, self.logger)?;
        }

        let work_dir = options.work_dir.clone().unwrap_or_else(env::temp_dir);
        let artifact = BackupArtifact::create_in(&work_dir, config.database())?;
        let artifact_path = artifact.path().to_path_buf();
        self.logger.debug(format_args!("temporary backup file: {}", artifact_path.display()));

        let result = self.transfer(config, &artifact, progress);
        artifact.cleanup(self.logger);
        result.map(|()| artifact_path)
    }

    fn transfer(
        &self,
        config: &MirrorConfig,
        artifact: &BackupArtifact,
        progress: &mut RunProgress,
    ) -> MirrorResult<()> {
        let backup = create_backup(self.runner, config.source(), artifact, self.logger)?;
        progress.artifact_bytes = backup.bytes;
        progress.backup_duration = backup.duration;

        let target = &config.target().connection;
        let manager = DatabaseManager::new(self.runner, target, self.logger);
        let action = manager.prepare(config.database(), config.options().drop_existing)?;
        progress.action = Some(action);

        let restore = restore_backup(
            self.runner,
            target,
            config.database(),
            config.options().parallel_jobs,
            artifact.path(),
            self.logger,
        )?;
        progress.restore_duration = restore.duration;
        progress.restore_warnings = restore.warnings();
        Ok(())
    }
}
