//! Cross-instance reconciliation commands

use colored::Colorize;
use spl_core::{EntityDiff, ObjectKind, StanzaStatus, SyncEngine, SyncOptions, SyncReport};

use crate::error::{CliError, Result};

/// Run the sync command for one object kind
///
/// Without any pass selected only the differences are printed.
pub async fn run_sync(
    engine: &SyncEngine<'_>,
    kind: ObjectKind,
    options: SyncOptions,
) -> Result<()> {
    if !(options.create || options.update || options.delete) {
        let (_, _, diff) = engine.diff(kind).await?;
        print!("{}", render_diff(kind, &diff));
        return Ok(());
    }

    let report = engine.sync(kind, options).await?;
    print_report(&report);
    if report.success {
        Ok(())
    } else {
        Err(CliError::user(format!(
            "{} error(s) while syncing {}",
            report.errors.len(),
            kind
        )))
    }
}

/// Run the sync confs command
pub async fn run_confs(engine: &SyncEngine<'_>, conf: &str) -> Result<()> {
    let report = engine.conf_stanzas(conf).await?;
    for stanza in &report.stanzas {
        match stanza.status {
            StanzaStatus::Missing => println!("{} [{}]", "missing".yellow().bold(), stanza.name),
            StanzaStatus::Identical => println!("{} [{}]", "same".dimmed(), stanza.name),
            StanzaStatus::Differs => {
                println!("{} [{}]", "differs".red().bold(), stanza.name);
                if let Some(diff) = &stanza.diff {
                    print!("{diff}");
                }
            }
        }
    }
    println!();
    println!(
        "{} {}.conf: {} missing, {} differ, {} identical",
        "Total:".dimmed(),
        report.conf,
        report.count(StanzaStatus::Missing),
        report.count(StanzaStatus::Differs),
        report.count(StanzaStatus::Identical)
    );
    Ok(())
}

fn render_diff(kind: ObjectKind, diff: &EntityDiff) -> String {
    let mut out = format!("Differences of {}: {}\n", kind, diff.summary());
    for name in &diff.missing {
        out.push_str(&format!("  + {name} (missing on destination)\n"));
    }
    for name in &diff.extra {
        out.push_str(&format!("  - {name} (only on destination)\n"));
    }
    for change in &diff.changes {
        out.push_str(&format!("  ~ {change}\n"));
    }
    out
}

fn print_report(report: &SyncReport) {
    for action in &report.actions {
        println!("{} {}", "OK".green().bold(), action);
    }
    for skipped in &report.skipped {
        println!("{} {}", "skipped".dimmed(), skipped);
    }
    for error in &report.errors {
        println!("{} {}", "error".red().bold(), error);
    }
}
