use crate::cli::HistoryArgs;
use crate::context::AppContext;
use chrono::{DateTime, Utc};
use eyre::{bail, Result};
use pg_mirror_core::history::{HistoryRecord, HistoryStore, RunStatus};

pub fn run_history(ctx: &AppContext, args: &HistoryArgs) -> Result<()> {
    let store = match &ctx.history {
        Some(store) => store.clone(),
        None => match HistoryStore::default_location() {
            Ok(store) => store,
            Err(err) => bail!("cannot locate run history: {err}"),
        },
    };

    if args.clear {
        match store.clear()? {
            true => println!("Cleared run history."),
            false => println!("No run history to clear."),
        }
        return Ok(());
    }

    let records = store.read_recent(args.limit)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    println!(
        "Run history (showing up to {} entries): {}",
        args.limit,
        records.len()
    );
    println!("History file: {}", store.path().display());
    println!(
        "Status: {}",
        if ctx.history.is_none() {
            "disabled via PG_MIRROR_DISABLE_HISTORY"
        } else if records.is_empty() {
            "enabled (no entries yet)"
        } else {
            "enabled"
        }
    );

    if records.is_empty() {
        return Ok(());
    }

    let failures = records
        .iter()
        .filter(|r| r.status == RunStatus::Failed)
        .count();
    println!(
        "Succeeded: {} | Failed: {}",
        records.len() - failures,
        failures
    );

    for record in &records {
        print_record(record);
    }
    Ok(())
}

fn print_record(record: &HistoryRecord) {
    let timestamp = DateTime::<Utc>::from(record.timestamp());
    let status = match record.status {
        RunStatus::Succeeded => "ok",
        RunStatus::Failed => "FAILED",
    };
    let action = record
        .action
        .map(|action| action.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {} {:<6} {} {} -> {} | {} | jobs={} | {} bytes | backup {} ms, restore {} ms",
        timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        status,
        record.database,
        record.source,
        record.target,
        action,
        record.parallel_jobs,
        record.artifact_bytes,
        record.backup_duration_ms,
        record.restore_duration_ms
    );
    if let Some(error) = &record.error {
        println!("      error: {error}");
    }
}
