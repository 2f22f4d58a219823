//! Local app commands

use std::path::Path;

use colored::Colorize;
use spl_core::{AppsManager, Prompter, ValidationOutcome};

use crate::error::Result;

/// Run the apps list command
pub fn run_apps_list(manager: &AppsManager, csv: Option<&Path>) -> Result<()> {
    let table = manager.table();
    if table.is_empty() {
        println!("{} No apps found.", "info:".cyan().bold());
    } else {
        print!("{table}");
    }
    if let Some(csv) = csv {
        manager.write_csv(csv)?;
        println!("{} {}", "Wrote".green().bold(), csv.display());
    }
    Ok(())
}

/// Run the apps validate command
pub async fn run_apps_validate(
    manager: &AppsManager,
    force: bool,
    cloudvet: Option<bool>,
    prompter: &dyn Prompter,
) -> Result<()> {
    let outcomes = manager.validate(force, cloudvet, prompter).await?;
    if outcomes.is_empty() {
        println!("{} No apps selected.", "info:".cyan().bold());
    }
    for outcome in &outcomes {
        print!("{}", render_outcome(outcome));
    }
    Ok(())
}

fn render_outcome(outcome: &ValidationOutcome) -> String {
    let packaging = &outcome.packaging;
    let state = if packaging.built { "built" } else { "reused" };
    let mut out = format!("{} ({})\n", packaging.app.bold(), state);
    if let Some(log) = &packaging.appinspect_log {
        out.push_str(log);
        if !log.ends_with('\n') {
            out.push('\n');
        }
    }
    for (package, checksum) in &packaging.packages {
        out.push_str(&format!("  {} {}\n", package.display(), checksum));
    }
    if let Some(summary) = &outcome.cloudvet_summary {
        let pretty = serde_json::to_string_pretty(summary).unwrap_or_else(|_| summary.to_string());
        out.push_str(&format!("  cloud vetting summary: {pretty}\n"));
    }
    out
}
