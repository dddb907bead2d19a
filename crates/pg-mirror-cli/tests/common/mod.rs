#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tempfile::tempdir;

use wait_timeout::ChildExt;

pub const SOURCE_PASSWORD: &str = "src-pw";
pub const TARGET_PASSWORD: &str = "dst-pw";

/// Scratch layout for one CLI invocation: a config file, an isolated
/// config dir for history, a work dir for the dump and a stub bin dir.
pub struct TestContext {
    pub _work: tempfile::TempDir,
    pub workspace: PathBuf,
    pub cli_bin: PathBuf,
    pub config_dir: PathBuf,
    pub dump_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub config_path: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        let work = tempdir().expect("tempdir");
        let workspace = work.path().to_path_buf();

        let config_dir = workspace.join("cli-config");
        fs::create_dir_all(&config_dir).expect("cli config");
        let dump_dir = workspace.join("dumps");
        fs::create_dir_all(&dump_dir).expect("dump dir");
        let bin_dir = workspace.join("bin");
        fs::create_dir_all(&bin_dir).expect("bin dir");

        let config_path = workspace.join("config.json");
        fs::write(&config_path, config_json(SOURCE_PASSWORD)).expect("write config");

        Self {
            _work: work,
            workspace,
            cli_bin: PathBuf::from(env!("CARGO_BIN_EXE_pg-mirror")),
            config_dir,
            dump_dir,
            bin_dir,
            config_path,
        }
    }

    /// Command for the CLI with PATH limited to the stub bin dir.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.cli_bin);
        cmd.env("PATH", &self.bin_dir)
            .env("PG_STUB_DIR", &self.workspace)
            .env_remove("RUST_LOG")
            .env_remove("PG_MIRROR_DISABLE_HISTORY")
            .env_remove("PGPASSWORD")
            .stdin(Stdio::null())
            .arg("--config-dir")
            .arg(&self.config_dir);
        cmd
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.workspace.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn mark_target_present(&self) {
        fs::write(self.workspace.join("exists"), "").expect("mark target present");
    }

    pub fn dump_dir_is_empty(&self) -> bool {
        fs::read_dir(&self.dump_dir)
            .expect("read dump dir")
            .next()
            .is_none()
    }

    /// Install shell stand-ins for pg_dump, psql and pg_restore.
    #[cfg(unix)]
    pub fn install_stub_tools(&self) {
        write_stub(&self.bin_dir, "pg_dump", PG_DUMP_STUB);
        write_stub(&self.bin_dir, "psql", PSQL_STUB);
        write_stub(&self.bin_dir, "pg_restore", PG_RESTORE_STUB);
    }
}

pub fn config_json(source_password: &str) -> String {
    format!(
        r#"{{
    "source": {{"host": "prod.db", "port": 5432, "database": "shop", "user": "reader", "password": "{source_password}"}},
    "target": {{"host": "staging.db", "user": "admin", "password": "{TARGET_PASSWORD}"}},
    "options": {{"drop_existing": false, "parallel_jobs": 2}}
}}"#
    )
}

#[cfg(unix)]
fn write_stub(dir: &Path, name: &str, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    fs::write(&path, body).expect("write stub");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod stub");
}

const PG_DUMP_STUB: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then echo "pg_dump (PostgreSQL) 16.3"; exit 0; fi
echo "pg_dump $*" >> "$PG_STUB_DIR/calls.log"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-f" ]; then out="$2"; shift; fi
  shift
done
printf 'PGDMP' > "$out"
if [ "$PGPASSWORD" != "src-pw" ]; then
  echo "pg_dump: error: password authentication failed" >&2
  exit 1
fi
exit 0
"#;

const PSQL_STUB: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then echo "psql (PostgreSQL) 16.3"; exit 0; fi
echo "psql $*" >> "$PG_STUB_DIR/calls.log"
if [ "$PGPASSWORD" != "dst-pw" ]; then exit 2; fi
case "$*" in
  *"FROM pg_database"*) if [ -f "$PG_STUB_DIR/exists" ]; then echo 1; fi ;;
esac
exit 0
"#;

const PG_RESTORE_STUB: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then echo "pg_restore (PostgreSQL) 16.3"; exit 0; fi
echo "pg_restore $*" >> "$PG_STUB_DIR/calls.log"
for last; do :; done
if [ ! -f "$last" ]; then
  echo "pg_restore: error: ERROR: archive $last missing" >&2
  exit 1
fi
echo "pg_restore: warning: errors ignored on restore: 1" >&2
exit 1
"#;

pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> std::process::Output {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn().expect("spawn command");

    match child.wait_timeout(timeout).expect("wait for process") {
        Some(_status) => child
            .wait_with_output()
            .expect("collect command output after completion"),
        None => {
            let _ = child.kill();
            let output = child
                .wait_with_output()
                .expect("collect output after killing command");
            panic!(
                "command timed out after {:?}\nstdout:\n{}\nstderr:\n{}",
                timeout,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }
    }
}
