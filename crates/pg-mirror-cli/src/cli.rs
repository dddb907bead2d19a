use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pg-mirror")]
#[command(version)]
#[command(about = "Mirror a PostgreSQL database from one server to another")]
#[command(after_help = "Run '<command> --help' for detailed options on each command.")]
pub struct Cli {
    /// Show debug output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
    /// Override the configuration directory (run history) for this invocation
    #[arg(long, global = true, value_name = "PATH")]
    pub config_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Back up the source database and restore it on the target server
    Mirror(MirrorArgs),
    /// Verify that pg_dump, pg_restore and psql are installed
    Check,
    /// Validate a configuration file without touching any server
    Validate(ValidateArgs),
    /// Show recent mirror runs recorded locally
    History(HistoryArgs),
}

#[derive(Args, Clone, Debug)]
pub struct MirrorArgs {
    /// Path to the JSON configuration file
    #[arg(long, short = 'c', default_value = "config.json", value_name = "PATH")]
    pub config: PathBuf,
    /// Number of parallel restore jobs (overrides options.parallel_jobs)
    #[arg(long, short = 'j', value_parser = clap::value_parser!(u32).range(1..))]
    pub jobs: Option<u32>,
    /// Drop and recreate the target database if it exists (overrides options.drop_existing)
    #[arg(long)]
    pub drop_existing: bool,
    /// Skip the PostgreSQL tool check
    #[arg(long)]
    pub skip_checks: bool,
    /// Show an interactive progress indicator
    #[arg(long, short = 'p')]
    pub progress: bool,
    /// Directory for the temporary dump file (defaults to the system temp dir)
    #[arg(long, value_name = "PATH")]
    pub work_dir: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Path to the JSON configuration file
    #[arg(long, short = 'c', default_value = "config.json", value_name = "PATH")]
    pub config: PathBuf,
}

#[derive(Args, Clone, Debug)]
pub struct HistoryArgs {
    /// Number of recent records to display (0 = all)
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
    /// Remove the stored history file
    #[arg(long)]
    pub clear: bool,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
