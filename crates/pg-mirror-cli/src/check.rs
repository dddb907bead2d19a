use eyre::{bail, Result};
use owo_colors::OwoColorize;
use pg_mirror_core::system_checks::{installation_help, SystemChecker};
use pg_mirror_core::SystemRunner;

pub fn run_check() -> Result<()> {
    log::info!("Checking PostgreSQL client tools...");
    let report = SystemChecker::new().check(&SystemRunner);

    for tool in &report.tools {
        match &tool.path {
            Some(path) => println!(
                "{} {:<10} {} ({})",
                "✓".green(),
                tool.name,
                path.display(),
                tool.version.as_deref().unwrap_or("unknown version")
            ),
            None => println!("{} {:<10} not found", "✗".red(), tool.name),
        }
    }

    if !report.all_present() {
        eprintln!();
        eprintln!("{}", installation_help());
        bail!(
            "required PostgreSQL tools not found: {}",
            report.missing().join(", ")
        );
    }

    println!("All required tools are installed.");
    Ok(())
}
