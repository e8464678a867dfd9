//! Status command implementation.

use crate::cli::commands::{display_path, open_existing};
use crate::error::Result;
use crate::storage::migrations::latest_version;
use crate::storage::TableCount;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    path: String,
    schema_version: u32,
    latest_version: u32,
    tables: Vec<TableCount>,
    orphaned_beacons: usize,
}

/// Execute status command.
///
/// # Errors
///
/// Returns [`Error::NotInitialized`](crate::error::Error::NotInitialized)
/// if the store does not exist yet, or a storage error.
pub fn execute(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let (path, db) = open_existing(db_path)?;

    let output = StatusOutput {
        path: display_path(&path),
        schema_version: db.schema_version()?,
        latest_version: latest_version(),
        tables: db.table_counts()?,
        orphaned_beacons: db.orphaned_beacon_ids()?.len(),
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{} {}", "Store:".bold(), output.path);
    println!(
        "{} v{} (latest v{})",
        "Schema:".bold(),
        output.schema_version,
        output.latest_version
    );
    println!();
    for count in &output.tables {
        println!("  {:<26} {:>8}", count.table, count.rows);
    }
    if output.orphaned_beacons > 0 {
        println!();
        println!(
            "{}",
            format!(
                "{} beacon id(s) referenced by history without an owned beacon",
                output.orphaned_beacons
            )
            .yellow()
        );
    }

    Ok(())
}
