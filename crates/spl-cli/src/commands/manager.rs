//! Single-instance commands: object listings, restart and info

use colored::Colorize;
use spl_core::{ConnectionAdapter, ObjectKind, Table};

use crate::error::{CliError, Result};

/// Parse an object kind given on the command line.
pub fn parse_kind(kind: &str) -> Result<ObjectKind> {
    kind.parse::<ObjectKind>().map_err(CliError::user)
}

pub async fn list_table(
    adapter: &ConnectionAdapter,
    kind: ObjectKind,
    details: bool,
) -> Result<Table> {
    Ok(adapter.objects(kind).await?.table(details))
}

/// Run the manager list command
pub async fn run_list(adapter: &ConnectionAdapter, kind: &str, details: bool) -> Result<()> {
    let kind = parse_kind(kind)?;
    let table = list_table(adapter, kind, details).await?;
    if table.is_empty() {
        println!("{} No {} objects in this namespace.", "info:".cyan().bold(), kind);
        return Ok(());
    }
    print!("{table}");
    println!("{} {}", "Total:".dimmed(), table.rows.len());
    Ok(())
}

/// Run the manager restart command
pub async fn run_restart(adapter: &ConnectionAdapter) -> Result<()> {
    adapter.restart().await?;
    println!("{} Restart of '{}' requested.", "OK".green().bold(), adapter.name());
    Ok(())
}

/// Run the manager info command
pub fn run_info(adapter: &ConnectionAdapter) -> Result<()> {
    println!("{} {}", "Connection:".bold(), adapter);
    println!("{} {}", "Namespace:".bold(), adapter.current_namespace());
    Ok(())
}
