//! Error categorization for the mirror pipeline.
//!
//! Every failure is sorted into one of four categories so the CLI can log it
//! with the right context before exiting:
//! - Configuration: missing or invalid fields, detected before any subprocess runs
//! - Prerequisite: a required PostgreSQL client tool is not on the search path
//! - Subprocess: `pg_dump`, `psql` or `pg_restore` reported a failure
//! - Internal: anything else (spawn failure, temp file I/O, ...)

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Category of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Prerequisite,
    Subprocess,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Prerequisite => "prerequisite",
            ErrorCategory::Subprocess => "subprocess",
            ErrorCategory::Internal => "internal",
        };
        f.write_str(label)
    }
}

/// Pipeline stage that issued a subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Backup,
    TargetLookup,
    TargetPrepare,
    Restore,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Backup => "backup",
            Stage::TargetLookup => "target lookup",
            Stage::TargetPrepare => "target preparation",
            Stage::Restore => "restore",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read configuration file {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse configuration file {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("required PostgreSQL tools not found: {}", .0.join(", "))]
    MissingTools(Vec<String>),

    #[error("{stage} failed: `{command}` exited with {}{}", describe_code(.code), describe_stderr(.stderr))]
    Subprocess {
        stage: Stage,
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to launch `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl MirrorError {
    pub fn config(message: impl Into<String>) -> Self {
        MirrorError::Config(message.into())
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        MirrorError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            MirrorError::Config(_)
            | MirrorError::ConfigRead { .. }
            | MirrorError::ConfigParse { .. } => ErrorCategory::Configuration,
            MirrorError::MissingTools(_) => ErrorCategory::Prerequisite,
            MirrorError::Subprocess { .. } => ErrorCategory::Subprocess,
            MirrorError::Spawn { .. } | MirrorError::Io { .. } => ErrorCategory::Internal,
        }
    }

    /// Process exit code for this failure. Every category maps to 1.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

fn describe_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

/// Result type for pipeline operations.
pub type MirrorResult<T> = std::result::Result<T, MirrorError>;
