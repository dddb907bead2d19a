mod check;
mod cli;
mod context;
mod diagnostics;
mod logging;
mod mirror;
mod validate;

use clap::Parser;
use eyre::Result;

use cli::{Cli, Commands};
use context::AppContext;
use pg_mirror_core::paths;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Some(dir) = &cli.config_dir {
        paths::set_config_dir(dir.clone());
    }
    let ctx = AppContext::load(cli.verbose);

    if let Err(err) = dispatch(&ctx, &cli.command).await {
        log::error!("{err:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn dispatch(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Mirror(args) => mirror::run_mirror(ctx, args).await,
        Commands::Check => check::run_check(),
        Commands::Validate(args) => validate::run_validate(args),
        Commands::History(args) => diagnostics::run_history(ctx, args),
    }
}
