use std::process::ExitCode;

use ab_scope::{artifacts::ArtifactDir, cli::Cli, logging::init_logging, run, ui::report};
use anyhow::{Context, Result};
use clap::Parser;

const LOG_FILE_NAME: &str = "ab-scope.log";

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli.into_config()?;

    let mut artifacts = ArtifactDir::create(config.artifacts_dir.as_deref())
        .context("cannot create artifacts directory")?;
    let log_file = config
        .log_file
        .clone()
        .unwrap_or_else(|| artifacts.root().join(LOG_FILE_NAME));
    init_logging(&log_file, config.console.short_only)?;

    let report = run::run(&config, &mut artifacts)?;
    report::print_report(&report);
    println!("Log: {}", log_file.display());

    Ok(ExitCode::from(report.exit_code.clamp(0, 255) as u8))
}
