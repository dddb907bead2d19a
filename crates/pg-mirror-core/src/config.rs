//! Mirror run configuration.
//!
//! The JSON document is first deserialized into an all-optional raw layer and
//! then validated field by field, so a missing key is reported by its dotted
//! path (`source.host is required`) instead of a serde location.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{MirrorError, MirrorResult};

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_PARALLEL_JOBS: u32 = 4;

/// Connection parameters for one server.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl ConnectionParams {
    /// `host:port`, for log lines.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub connection: ConnectionParams,
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    pub connection: ConnectionParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorOptions {
    pub drop_existing: bool,
    pub parallel_jobs: u32,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            drop_existing: false,
            parallel_jobs: DEFAULT_PARALLEL_JOBS,
        }
    }
}

/// Command-line adjustments applied on top of the file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigOverrides {
    pub parallel_jobs: Option<u32>,
    pub drop_existing: bool,
}

/// Validated, immutable description of one mirror run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    source: SourceConfig,
    target: TargetConfig,
    options: MirrorOptions,
}

impl MirrorConfig {
    pub fn new(source: SourceConfig, target: TargetConfig, options: MirrorOptions) -> Self {
        Self {
            source,
            target,
            options,
        }
    }

    pub fn load(path: &Path) -> MirrorResult<Self> {
        let contents = fs::read_to_string(path).map_err(|source| MirrorError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawConfig =
            serde_json::from_str(&contents).map_err(|source| MirrorError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        raw.validate()
    }

    pub fn from_json_str(json: &str) -> MirrorResult<Self> {
        let raw: RawConfig = serde_json::from_str(json)
            .map_err(|err| MirrorError::config(format!("malformed JSON: {err}")))?;
        raw.validate()
    }

    /// Consume the config and return one with the overrides applied.
    pub fn with_overrides(self, overrides: &ConfigOverrides) -> MirrorResult<Self> {
        let mut options = self.options;
        if let Some(jobs) = overrides.parallel_jobs {
            if jobs == 0 {
                return Err(MirrorError::config("--jobs must be at least 1"));
            }
            options.parallel_jobs = jobs;
        }
        if overrides.drop_existing {
            options.drop_existing = true;
        }
        Ok(Self { options, ..self })
    }

    pub fn source(&self) -> &SourceConfig {
        &self.source
    }

    pub fn target(&self) -> &TargetConfig {
        &self.target
    }

    pub fn options(&self) -> MirrorOptions {
        self.options
    }

    /// Name of the database on both sides. Renaming is not supported.
    pub fn database(&self) -> &str {
        &self.source.database
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    source: Option<RawSource>,
    target: Option<RawTarget>,
    #[serde(default)]
    options: RawOptions,
}

#[derive(Debug, Default, Deserialize)]
struct RawSource {
    host: Option<String>,
    port: Option<u32>,
    database: Option<String>,
    user: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTarget {
    host: Option<String>,
    port: Option<u32>,
    user: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawOptions {
    drop_existing: Option<bool>,
    parallel_jobs: Option<i64>,
}

impl RawConfig {
    fn validate(self) -> MirrorResult<MirrorConfig> {
        let source = self
            .source
            .ok_or_else(|| MirrorError::config("source section is required"))?;
        let target = self
            .target
            .ok_or_else(|| MirrorError::config("target section is required"))?;

        let source = SourceConfig {
            connection: ConnectionParams {
                host: required_text("source.host", source.host)?,
                port: port("source.port", source.port)?,
                user: required_text("source.user", source.user)?,
                password: required("source.password", source.password)?,
            },
            database: required_text("source.database", source.database)?,
        };

        let target = TargetConfig {
            connection: ConnectionParams {
                host: required_text("target.host", target.host)?,
                port: port("target.port", target.port)?,
                user: required_text("target.user", target.user)?,
                password: required("target.password", target.password)?,
            },
        };

        let parallel_jobs = match self.options.parallel_jobs {
            None => DEFAULT_PARALLEL_JOBS,
            Some(jobs) if (1..=i64::from(u32::MAX)).contains(&jobs) => jobs as u32,
            Some(_) => {
                return Err(MirrorError::config(
                    "options.parallel_jobs must be at least 1",
                ))
            }
        };

        Ok(MirrorConfig {
            source,
            target,
            options: MirrorOptions {
                drop_existing: self.options.drop_existing.unwrap_or(false),
                parallel_jobs,
            },
        })
    }
}

fn required(field: &str, value: Option<String>) -> MirrorResult<String> {
    value.ok_or_else(|| MirrorError::config(format!("{field} is required")))
}

fn required_text(field: &str, value: Option<String>) -> MirrorResult<String> {
    let value = required(field, value)?;
    if value.trim().is_empty() {
        return Err(MirrorError::config(format!("{field} must not be empty")));
    }
    Ok(value)
}

fn port(field: &str, value: Option<u32>) -> MirrorResult<u16> {
    match value {
        None => Ok(DEFAULT_PORT),
        Some(port) if (1..=u32::from(u16::MAX)).contains(&port) => Ok(port as u16),
        Some(port) => Err(MirrorError::config(format!(
            "{field} must be between 1 and 65535 (got {port})"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCategory;

    const FULL: &str = r#"{
        "source": {"host": "prod.db", "port": 6432, "database": "shop", "user": "reader", "password": "pw1"},
        "target": {"host": "staging.db", "user": "admin", "password": "pw2"},
        "options": {"drop_existing": true, "parallel_jobs": 8}
    }"#;

    fn config_error(json: &str) -> String {
        let err = MirrorConfig::from_json_str(json).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        err.to_string()
    }

    #[test]
    fn parses_full_document() {
        let cfg = MirrorConfig::from_json_str(FULL).unwrap();
        assert_eq!(cfg.source().connection.host, "prod.db");
        assert_eq!(cfg.source().connection.port, 6432);
        assert_eq!(cfg.target().connection.port, DEFAULT_PORT);
        assert_eq!(cfg.database(), "shop");
        assert!(cfg.options().drop_existing);
        assert_eq!(cfg.options().parallel_jobs, 8);
    }

    #[test]
    fn applies_defaults() {
        let cfg = MirrorConfig::from_json_str(
            r#"{
                "source": {"host": "a", "database": "d", "user": "u", "password": ""},
                "target": {"host": "b", "user": "u", "password": "p"}
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.source().connection.port, 5432);
        assert_eq!(cfg.options(), MirrorOptions::default());
        assert_eq!(cfg.options().parallel_jobs, 4);
        assert!(!cfg.options().drop_existing);
    }

    #[test]
    fn reports_missing_fields_by_path() {
        assert!(config_error(r#"{"target": {}}"#).contains("source section is required"));
        assert!(config_error(
            r#"{"source": {"host": "a", "user": "u", "password": "p"},
                "target": {"host": "b", "user": "u", "password": "p"}}"#
        )
        .contains("source.database is required"));
        assert!(config_error(
            r#"{"source": {"host": "a", "database": "d", "user": "u", "password": "p"},
                "target": {"host": "b", "user": "u"}}"#
        )
        .contains("target.password is required"));
        assert!(config_error(
            r#"{"source": {"host": " ", "database": "d", "user": "u", "password": "p"},
                "target": {"host": "b", "user": "u", "password": "p"}}"#
        )
        .contains("source.host must not be empty"));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(config_error(
            r#"{"source": {"host": "a", "port": 70000, "database": "d", "user": "u", "password": "p"},
                "target": {"host": "b", "user": "u", "password": "p"}}"#
        )
        .contains("source.port must be between 1 and 65535"));
        assert!(config_error(
            r#"{"source": {"host": "a", "database": "d", "user": "u", "password": "p"},
                "target": {"host": "b", "user": "u", "password": "p"},
                "options": {"parallel_jobs": 0}}"#
        )
        .contains("options.parallel_jobs must be at least 1"));
        assert!(config_error("{not json").contains("malformed JSON"));
    }

    #[test]
    fn overrides_build_a_new_value() {
        let cfg = MirrorConfig::from_json_str(FULL).unwrap();
        let adjusted = cfg
            .clone()
            .with_overrides(&ConfigOverrides {
                parallel_jobs: Some(2),
                drop_existing: false,
            })
            .unwrap();
        assert_eq!(adjusted.options().parallel_jobs, 2);
        assert!(adjusted.options().drop_existing);
        assert_eq!(cfg.options().parallel_jobs, 8);

        let err = cfg
            .with_overrides(&ConfigOverrides {
                parallel_jobs: Some(0),
                drop_existing: false,
            })
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn debug_redacts_passwords() {
        let cfg = MirrorConfig::from_json_str(FULL).unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("pw1"));
        assert!(!rendered.contains("pw2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn load_reports_unreadable_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            MirrorConfig::load(&missing),
            Err(MirrorError::ConfigRead { .. })
        ));

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{").unwrap();
        assert!(matches!(
            MirrorConfig::load(&broken),
            Err(MirrorError::ConfigParse { .. })
        ));

        let good = dir.path().join("config.json");
        fs::write(&good, FULL).unwrap();
        assert_eq!(MirrorConfig::load(&good).unwrap().database(), "shop");
    }
}
