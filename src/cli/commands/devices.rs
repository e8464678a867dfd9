//! Device command implementations.

use crate::cli::commands::open_existing;
use crate::cli::DeviceCommands;
use crate::error::{Error, Result};
use crate::model::time::now_millis;
use crate::model::{CanonicId, GoogleDevice};
use crate::storage::Database;
use crate::validate::find_similar_ids;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct DeviceListOutput {
    devices: Vec<GoogleDevice>,
    count: usize,
}

#[derive(Serialize)]
struct DeviceRemoveOutput {
    canonic_id: CanonicId,
    removed: bool,
}

/// Execute device commands.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the device is unknown.
pub fn execute(command: &DeviceCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let (_, db) = open_existing(db_path)?;
    match command {
        DeviceCommands::List { all } => list(&db, *all, json),
        DeviceCommands::Remove { canonic_id } => remove(&db, canonic_id, json),
    }
}

fn list(db: &Database, all: bool, json: bool) -> Result<()> {
    let repo = db.google_devices();
    let devices = if all {
        repo.get_all()?
    } else {
        repo.get_all_active()?
    };

    if json {
        let output = DeviceListOutput {
            count: devices.len(),
            devices,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No devices.");
        return Ok(());
    }

    for device in &devices {
        let label = format!(
            "{} {}",
            device.emoji.as_deref().unwrap_or(" "),
            device.name.as_deref().unwrap_or("(unnamed)")
        );
        if device.is_removed {
            println!("{}  {}", device.canonic_id.as_str().dimmed(), label.strikethrough());
        } else {
            println!("{}  {label}", device.canonic_id.as_str().dimmed());
        }
    }
    Ok(())
}

fn remove(db: &Database, canonic_id: &str, json: bool) -> Result<()> {
    let id = CanonicId::new(canonic_id);
    let repo = db.google_devices();
    let Some(device) = repo.get_by_id(&id)? else {
        let known: Vec<String> = repo
            .get_all()?
            .into_iter()
            .map(|d| d.canonic_id.to_string())
            .collect();
        return Err(Error::NotFound {
            entity: "device",
            id: canonic_id.to_string(),
            suggestions: find_similar_ids(canonic_id, &known, 3),
        });
    };

    repo.set_removed(&id, now_millis())?;

    if json {
        let output = DeviceRemoveOutput {
            canonic_id: id,
            removed: true,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if device.is_removed {
        println!("Device {canonic_id} was already removed");
    } else {
        println!("Removed device {canonic_id}");
    }
    Ok(())
}
