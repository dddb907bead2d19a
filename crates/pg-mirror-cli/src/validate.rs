use crate::cli::ValidateArgs;
use eyre::{Context, Result};
use pg_mirror_core::MirrorConfig;

pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    let config = MirrorConfig::load(&args.config)
        .wrap_err_with(|| format!("configuration {} is invalid", args.config.display()))?;

    let source = &config.source().connection;
    let target = &config.target().connection;
    let options = config.options();
    println!("Configuration is valid: {}", args.config.display());
    println!(
        "  Source  : {} @ {} (user {})",
        config.database(),
        source.endpoint(),
        source.user
    );
    println!(
        "  Target  : {} @ {} (user {})",
        config.database(),
        target.endpoint(),
        target.user
    );
    println!(
        "  Options : parallel_jobs={} drop_existing={}",
        options.parallel_jobs, options.drop_existing
    );
    Ok(())
}
