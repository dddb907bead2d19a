use crate::cli::MirrorArgs;
use crate::context::AppContext;
use eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use pg_mirror_core::orchestrator::{MirrorSummary, RunOptions};
use pg_mirror_core::system_checks::installation_help;
use pg_mirror_core::{
    ConfigOverrides, ErrorCategory, FacadeLogger, MirrorOrchestrator, SystemRunner,
};

pub async fn run_mirror(ctx: &AppContext, args: &MirrorArgs) -> Result<()> {
    let overrides = ConfigOverrides {
        parallel_jobs: args.jobs,
        drop_existing: args.drop_existing,
    };
    let options = RunOptions {
        skip_checks: args.skip_checks,
        work_dir: args.work_dir.clone(),
    };

    log::info!(
        "pg-mirror v{}: mirroring with {}",
        env!("CARGO_PKG_VERSION"),
        args.config.display()
    );

    let progress_bar = if !args.progress {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["-", "\\", "|", "/"]),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message(format!("Mirroring using {}", args.config.display()));
        Some(pb)
    };

    let config_path = args.config.clone();
    let history = ctx.history.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let runner = SystemRunner;
        let logger = FacadeLogger;
        MirrorOrchestrator::new(&runner, &logger)
            .with_history(history)
            .mirror_from_file(&config_path, &overrides, &options)
    })
    .await
    .wrap_err("mirror worker panicked")?;

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    if let Err(err) = &outcome {
        if err.category() == ErrorCategory::Prerequisite {
            eprintln!();
            eprintln!("{}", installation_help());
        }
    }
    let summary = outcome.wrap_err("mirror failed")?;
    print_summary(ctx.verbose, &summary);
    Ok(())
}

fn print_summary(verbose: bool, summary: &MirrorSummary) {
    println!(
        "Mirrored '{}' ({}) in {:.2?}",
        summary.database, summary.action, summary.duration
    );
    println!(
        "  Backup  : {:.2} MiB in {:.2?}",
        summary.artifact_bytes as f64 / (1024.0 * 1024.0),
        summary.backup_duration
    );
    match summary.restore_warnings {
        Some(count) => println!(
            "  Restore : {:.2?} ({} ignored error(s))",
            summary.restore_duration, count
        ),
        None => println!("  Restore : {:.2?}", summary.restore_duration),
    }
    if verbose {
        println!("  Artifact: {} (removed)", summary.artifact_path.display());
    }
}
