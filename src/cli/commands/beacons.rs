//! Beacon command implementations.

use crate::cli::commands::open_existing;
use crate::cli::BeaconCommands;
use crate::error::{Error, Result};
use crate::model::{BeaconId, OwnedBeacon};
use crate::storage::Database;
use crate::validate::find_similar_ids;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct BeaconItem {
    #[serde(flatten)]
    beacon: OwnedBeacon,
    display_name: Option<String>,
    hidden: bool,
}

#[derive(Serialize)]
struct BeaconListOutput {
    beacons: Vec<BeaconItem>,
    count: usize,
}

#[derive(Serialize)]
struct OrphanOutput {
    beacon_ids: Vec<BeaconId>,
    count: usize,
}

/// Execute beacon commands.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the beacon is unknown.
pub fn execute(command: &BeaconCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let (_, db) = open_existing(db_path)?;
    match command {
        BeaconCommands::List => list(&db, json),
        BeaconCommands::Orphans => orphans(&db, json),
        BeaconCommands::Forget { id } => forget(&db, id, json),
    }
}

fn list(db: &Database, json: bool) -> Result<()> {
    let options = db.beacon_options();
    let names = db.naming_records();

    let beacons = db
        .owned_beacons()
        .get_all()?
        .into_iter()
        .map(|beacon| -> Result<BeaconItem> {
            let opts = options.options_or_default(&beacon.id)?;
            // User override, then the newest naming record, then the import.
            let display_name = match opts.ui_name {
                Some(name) => Some(name),
                None => names
                    .get_for_beacon(&beacon.id)?
                    .into_iter()
                    .next()
                    .map(|r| r.name)
                    .or_else(|| beacon.name.clone()),
            };
            Ok(BeaconItem {
                display_name,
                hidden: opts.hide_from_map,
                beacon,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if json {
        let output = BeaconListOutput {
            count: beacons.len(),
            beacons,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if beacons.is_empty() {
        println!("No beacons.");
        return Ok(());
    }

    for item in &beacons {
        let name = item.display_name.as_deref().unwrap_or("(unnamed)");
        let hidden = if item.hidden { " [hidden]" } else { "" };
        println!(
            "{}  {name}{}",
            item.beacon.id.as_str().dimmed(),
            hidden.yellow()
        );
    }
    Ok(())
}

fn orphans(db: &Database, json: bool) -> Result<()> {
    let beacon_ids = db.orphaned_beacon_ids()?;

    if json {
        let output = OrphanOutput {
            count: beacon_ids.len(),
            beacon_ids,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if beacon_ids.is_empty() {
        println!("No orphaned history.");
    }
    for id in &beacon_ids {
        println!("{id}");
    }
    Ok(())
}

fn forget(db: &Database, id: &str, json: bool) -> Result<()> {
    let beacon_id = BeaconId::new(id);
    if !db.forget_beacon(&beacon_id)? {
        let known: Vec<String> = db
            .owned_beacons()
            .get_all()?
            .into_iter()
            .map(|b| b.id.to_string())
            .collect();
        return Err(Error::NotFound {
            entity: "beacon",
            id: id.to_string(),
            suggestions: find_similar_ids(id, &known, 3),
        });
    }

    if json {
        println!("{}", serde_json::json!({ "id": beacon_id, "forgotten": true }));
    } else {
        println!("Forgot beacon {id}; its location history is kept");
    }
    Ok(())
}
