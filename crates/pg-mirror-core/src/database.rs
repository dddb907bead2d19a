//! Target database lookup and preparation through `psql`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ConnectionParams;
use crate::errors::{MirrorError, MirrorResult, Stage};
use crate::logger::MirrorLogger;
use crate::process::{CommandRunner, CommandSpec, ExecutionResult, PASSWORD_ENV};
use crate::system_checks::PSQL;

/// Database `psql` connects to for administrative statements.
pub const MAINTENANCE_DATABASE: &str = "postgres";

/// What the preparation step does to the target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetAction {
    Create,
    Reuse,
    Recreate,
}

impl TargetAction {
    pub fn decide(exists: bool, drop_existing: bool) -> Self {
        match (exists, drop_existing) {
            (false, _) => TargetAction::Create,
            (true, false) => TargetAction::Reuse,
            (true, true) => TargetAction::Recreate,
        }
    }
}

impl fmt::Display for TargetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TargetAction::Create => "create",
            TargetAction::Reuse => "reuse",
            TargetAction::Recreate => "drop and recreate",
        };
        f.write_str(label)
    }
}

/// Quote `name` as a SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote `value` as a SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Administrative `psql` session against one server.
pub struct DatabaseManager<'a> {
    runner: &'a dyn CommandRunner,
    connection: &'a ConnectionParams,
    logger: &'a dyn MirrorLogger,
}

impl<'a> DatabaseManager<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        connection: &'a ConnectionParams,
        logger: &'a dyn MirrorLogger,
    ) -> Self {
        Self {
            runner,
            connection,
            logger,
        }
    }

    fn psql(&self, flag: &str, sql: &str) -> CommandSpec {
        let conn = self.connection;
        CommandSpec::new(PSQL)
            .args(["-h", conn.host.as_str()])
            .args(["-p".to_string(), conn.port.to_string()])
            .args(["-U", conn.user.as_str()])
            .args(["-d", MAINTENANCE_DATABASE])
            .arg("--no-password")
            .args(["-v", "ON_ERROR_STOP=1"])
            .args([flag, sql])
            .env(PASSWORD_ENV, conn.password.as_str())
    }

    fn execute(&self, stage: Stage, command: CommandSpec) -> MirrorResult<ExecutionResult> {
        self.logger.debug(format_args!("running: {command}"));
        let result = self.runner.run(&command)?;
        if !result.success() {
            return Err(MirrorError::Subprocess {
                stage,
                command: command.to_string(),
                code: result.exit_code,
                stderr: result.stderr,
            });
        }
        Ok(result)
    }

    pub fn exists_command(&self, database: &str) -> CommandSpec {
        let sql = format!(
            "SELECT 1 FROM pg_database WHERE datname = {};",
            quote_literal(database)
        );
        self.psql("-tAc", &sql)
    }

    pub fn database_exists(&self, database: &str) -> MirrorResult<bool> {
        let result = self.execute(Stage::TargetLookup, self.exists_command(database))?;
        let exists = result.stdout.trim() == "1";
        self.logger.debug(format_args!(
            "database '{database}' exists on {}: {exists}",
            self.connection.endpoint()
        ));
        Ok(exists)
    }

    pub fn create_database(&self, database: &str) -> MirrorResult<()> {
        let sql = format!("CREATE DATABASE {};", quote_ident(database));
        self.execute(Stage::TargetPrepare, self.psql("-c", &sql))?;
        self.logger.info(format_args!("Database '{database}' created"));
        Ok(())
    }

    /// Disconnect other sessions, drop, and create again.
    pub fn drop_and_create_database(&self, database: &str) -> MirrorResult<()> {
        let terminate = format!(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
             WHERE datname = {} AND pid <> pg_backend_pid();",
            quote_literal(database)
        );
        self.logger.debug(format_args!("terminating open sessions on '{database}'"));
        if let Err(err) = self.execute(Stage::TargetPrepare, self.psql("-c", &terminate)) {
            self.logger.warn(format_args!("could not terminate sessions on '{database}': {err}"));
        }

        self.logger.debug(format_args!("dropping '{database}'"));
        let drop = format!("DROP DATABASE IF EXISTS {};", quote_ident(database));
        self.execute(Stage::TargetPrepare, self.psql("-c", &drop))?;

        self.logger.debug(format_args!("creating '{database}'"));
        let create = format!("CREATE DATABASE {};", quote_ident(database));
        self.execute(Stage::TargetPrepare, self.psql("-c", &create))?;

        self.logger.info(format_args!("Database '{database}' recreated"));
        Ok(())
    }

    /// Bring the target database into the state the options ask for.
    pub fn prepare(&self, database: &str, drop_existing: bool) -> MirrorResult<TargetAction> {
        let exists = self.database_exists(database)?;
        let action = TargetAction::decide(exists, drop_existing);
        match action {
            TargetAction::Create => {
                self.logger.info(format_args!(
                    "Database '{database}' does not exist on {}, creating it",
                    self.connection.endpoint()
                ));
                self.create_database(database)?;
            }
            TargetAction::Reuse => {
                self.logger.info(format_args!(
                    "Database '{database}' already exists on {}, restoring into it",
                    self.connection.endpoint()
                ));
            }
            TargetAction::Recreate => {
                self.logger.warn(format_args!(
                    "Database '{database}' already exists on {}, dropping and recreating it",
                    self.connection.endpoint()
                ));
                self.drop_and_create_database(database)?;
            }
        }
        Ok(action)
    }
}
