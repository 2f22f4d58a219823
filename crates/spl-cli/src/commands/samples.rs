//! Sample listing and download commands

use colored::Colorize;
use spl_core::{ConnectionAdapter, DownloadReport, Prompter, SamplesManager};

use crate::error::{CliError, Result};

/// Run the samples list command
pub fn run_samples_list(manager: &SamplesManager) -> Result<()> {
    let table = manager.table();
    if table.is_empty() {
        println!("{} No samples configured.", "info:".cyan().bold());
        return Ok(());
    }
    print!("{table}");
    Ok(())
}

/// Run the samples download command
pub async fn run_samples_download(
    manager: &SamplesManager,
    adapter: &ConnectionAdapter,
    name: Option<&str>,
    prompter: &dyn Prompter,
) -> Result<()> {
    let report = manager.download(adapter, name, prompter).await?;
    print_report(&report);
    if report.errors.is_empty() {
        Ok(())
    } else {
        Err(CliError::user(format!(
            "{} sample download(s) failed",
            report.errors.len()
        )))
    }
}

fn print_report(report: &DownloadReport) {
    for path in &report.written {
        println!("{} {}", "Wrote".green().bold(), path.display());
    }
    for warning in &report.warnings {
        println!("{} {}", "warning:".yellow().bold(), warning);
    }
    for error in &report.errors {
        println!("{} {}", "error".red().bold(), error);
    }
}
