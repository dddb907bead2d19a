use std::path::PathBuf;

/// Options for one `mirror` run that do not come from the config file.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Skip the PATH probe for pg_dump/pg_restore/psql.
    pub skip_checks: bool,
    /// Directory for the temporary dump; the system temp dir when unset.
    pub work_dir: Option<PathBuf>,
}
