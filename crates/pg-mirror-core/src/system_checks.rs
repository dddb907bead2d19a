//! Pre-flight probe for the PostgreSQL client tools.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::errors::{MirrorError, MirrorResult};
use crate::logger::MirrorLogger;
use crate::process::{CommandRunner, CommandSpec};

pub const PG_DUMP: &str = "pg_dump";
pub const PG_RESTORE: &str = "pg_restore";
pub const PSQL: &str = "psql";

pub const REQUIRED_TOOLS: [&str; 3] = [PG_DUMP, PG_RESTORE, PSQL];

/// Host families with a known installation recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFamily {
    Debian,
    MacOs,
    Windows,
}

impl HostFamily {
    pub const ALL: [HostFamily; 3] = [HostFamily::Debian, HostFamily::MacOs, HostFamily::Windows];

    pub fn current() -> Option<Self> {
        if cfg!(target_os = "linux") {
            Some(HostFamily::Debian)
        } else if cfg!(target_os = "macos") {
            Some(HostFamily::MacOs)
        } else if cfg!(windows) {
            Some(HostFamily::Windows)
        } else {
            None
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HostFamily::Debian => "Debian/Ubuntu",
            HostFamily::MacOs => "macOS",
            HostFamily::Windows => "Windows",
        }
    }

    pub fn install_hint(self) -> &'static str {
        match self {
            HostFamily::Debian => "sudo apt-get update && sudo apt-get install -y postgresql-client",
            HostFamily::MacOs => {
                "brew install libpq && brew link --force libpq (or: brew install postgresql)"
            }
            HostFamily::Windows => {
                "install PostgreSQL from https://www.postgresql.org/download/windows/ (or: choco install postgresql) and add its bin directory to PATH"
            }
        }
    }
}

/// Installation help for this host, or for every known family when the host
/// is not recognised.
pub fn installation_help() -> String {
    let families: Vec<HostFamily> = match HostFamily::current() {
        Some(family) => vec![family],
        None => HostFamily::ALL.to_vec(),
    };
    let mut help = String::from("Install the PostgreSQL client tools (pg_dump, pg_restore, psql):");
    for family in families {
        help.push_str(&format!("\n  {}: {}", family.label(), family.install_hint()));
    }
    help
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub name: &'static str,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
}

impl ToolStatus {
    pub fn found(&self) -> bool {
        self.path.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemReport {
    pub tools: Vec<ToolStatus>,
}

impl SystemReport {
    pub fn all_present(&self) -> bool {
        self.tools.iter().all(ToolStatus::found)
    }

    pub fn missing(&self) -> Vec<String> {
        self.tools
            .iter()
            .filter(|tool| !tool.found())
            .map(|tool| tool.name.to_string())
            .collect()
    }

    pub fn ensure_complete(&self) -> MirrorResult<()> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MirrorError::MissingTools(missing))
        }
    }
}

/// Resolves the required tools on a search path (the process `PATH` unless
/// one is supplied).
#[derive(Debug, Clone, Default)]
pub struct SystemChecker {
    search_path: Option<OsString>,
}

impl SystemChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }

    pub fn resolve(&self, tool: &str) -> Option<PathBuf> {
        let resolved = match &self.search_path {
            Some(paths) => which::which_in(tool, Some(paths), Path::new(".")),
            None => which::which(tool),
        };
        resolved.ok()
    }

    /// Resolve every required tool and, for those found, ask for `--version`.
    /// A failing version probe leaves `version` empty; it never fails the check.
    pub fn check(&self, runner: &dyn CommandRunner) -> SystemReport {
        let tools = REQUIRED_TOOLS
            .iter()
            .map(|&name| {
                let path = self.resolve(name);
                let version = path.as_deref().and_then(|path| probe_version(runner, path));
                ToolStatus {
                    name,
                    path,
                    version,
                }
            })
            .collect();
        SystemReport { tools }
    }

    /// Run [`check`](Self::check), log the per-tool outcome and fail with a
    /// prerequisite error when anything is missing.
    pub fn verify(
        &self,
        runner: &dyn CommandRunner,
        logger: &dyn MirrorLogger,
    ) -> MirrorResult<SystemReport> {
        let report = self.check(runner);
        for tool in &report.tools {
            match &tool.path {
                Some(path) => logger.debug(format_args!(
                    "{} found at {} ({})",
                    tool.name,
                    path.display(),
                    tool.version.as_deref().unwrap_or("unknown version")
                )),
                None => logger.error(format_args!("{} not found on PATH", tool.name)),
            }
        }
        report.ensure_complete()?;
        Ok(report)
    }
}

fn probe_version(runner: &dyn CommandRunner, path: &Path) -> Option<String> {
    let command = CommandSpec::new(path.to_string_lossy()).arg("--version");
    let result = runner.run(&command).ok()?;
    if !result.success() {
        return None;
    }
    result
        .stdout
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ExecutionResult;

    struct VersionRunner;

    impl CommandRunner for VersionRunner {
        fn run(&self, command: &CommandSpec) -> MirrorResult<ExecutionResult> {
            let name = Path::new(&command.program)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(ExecutionResult {
                exit_code: Some(0),
                stdout: format!("{name} (PostgreSQL) 16.3\n"),
                stderr: String::new(),
            })
        }
    }

    #[cfg(unix)]
    fn install_stub(dir: &Path, name: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn empty_search_path_reports_all_missing() {
        let dir = tempfile::tempdir().unwrap();
        let checker = SystemChecker::with_search_path(dir.path());
        let report = checker.check(&VersionRunner);
        assert!(!report.all_present());
        assert_eq!(report.missing(), vec!["pg_dump", "pg_restore", "psql"]);
        let err = report.ensure_complete().unwrap_err();
        assert_eq!(
            err.to_string(),
            "required PostgreSQL tools not found: pg_dump, pg_restore, psql"
        );
    }

    #[cfg(unix)]
    #[test]
    fn partial_install_names_the_gap() {
        let dir = tempfile::tempdir().unwrap();
        install_stub(dir.path(), PG_DUMP);
        install_stub(dir.path(), PSQL);
        let report = SystemChecker::with_search_path(dir.path()).check(&VersionRunner);
        assert_eq!(report.missing(), vec!["pg_restore"]);
        let dump = &report.tools[0];
        assert_eq!(dump.path.as_deref(), Some(dir.path().join(PG_DUMP).as_path()));
        assert_eq!(dump.version.as_deref(), Some("pg_dump (PostgreSQL) 16.3"));
    }

    #[cfg(unix)]
    #[test]
    fn verify_logs_and_passes_with_full_install() {
        let dir = tempfile::tempdir().unwrap();
        for tool in REQUIRED_TOOLS {
            install_stub(dir.path(), tool);
        }
        let logger = crate::logger::RecordingLogger::new();
        let report = SystemChecker::with_search_path(dir.path())
            .verify(&VersionRunner, &logger)
            .unwrap();
        assert!(report.all_present());
        assert!(logger.contains("psql found at"));
    }

    #[test]
    fn help_covers_known_hosts() {
        for family in HostFamily::ALL {
            assert!(!family.install_hint().is_empty());
        }
        assert!(HostFamily::Debian.install_hint().contains("apt"));
        assert!(HostFamily::MacOs.install_hint().contains("brew"));
        assert!(HostFamily::Windows.install_hint().contains("postgresql.org"));
        assert!(installation_help().contains("pg_restore"));
    }
}
