//! Migrate command implementation.

use crate::cli::commands::{display_path, store_path};
use crate::error::Result;
use crate::storage::{Database, MigrationReport};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct MigrateOutput<'a> {
    path: String,
    created: bool,
    #[serde(flatten)]
    report: &'a MigrationReport,
}

/// Create the store if needed and apply pending migrations.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or a migration fails.
pub fn execute(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let path = store_path(db_path)?;
    let created = !path.exists();
    let db = Database::open_path(&path)?;
    let report = db.migration_report();

    if json {
        let output = MigrateOutput {
            path: display_path(&path),
            created,
            report,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if created {
        println!("Created store at {}", display_path(&path));
    }
    if report.is_noop() {
        println!("Schema is up to date (v{})", report.to);
    } else {
        let applied = report
            .applied
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{} v{} -> v{} (applied: {applied})",
            "Migrated".green(),
            report.from,
            report.to
        );
    }

    Ok(())
}
