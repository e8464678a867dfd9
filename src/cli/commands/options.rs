//! Beacon options command implementations.

use crate::cli::commands::open_existing;
use crate::cli::OptionsCommands;
use crate::error::Result;
use crate::model::BeaconId;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct OptionsResetOutput {
    beacon_id: BeaconId,
    reset: bool,
}

/// Execute options commands.
///
/// Options are keyed by beacon id but do not require the beacon to exist.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the query fails.
pub fn execute(command: &OptionsCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let (_, db) = open_existing(db_path)?;
    let repo = db.beacon_options();

    match command {
        OptionsCommands::Show { beacon_id } => {
            let beacon_id = BeaconId::new(beacon_id.as_str());
            let customized = repo.get_by_beacon_id(&beacon_id)?.is_some();
            let options = repo.options_or_default(&beacon_id)?;

            if json {
                let mut value = serde_json::to_value(&options)?;
                value["customized"] = serde_json::Value::Bool(customized);
                println!("{value}");
                return Ok(());
            }

            println!("beacon:        {}", options.beacon_id);
            println!("ui_name:       {}", options.ui_name.as_deref().unwrap_or("-"));
            println!("emoji:         {}", options.emoji.as_deref().unwrap_or("-"));
            println!("hide_from_map: {}", options.hide_from_map);
            if !customized {
                println!("(defaults)");
            }
        }
        OptionsCommands::Reset { beacon_id } => {
            let beacon_id = BeaconId::new(beacon_id.as_str());
            let reset = repo.delete_by_beacon_id(&beacon_id)?;

            if json {
                let output = OptionsResetOutput { beacon_id, reset };
                println!("{}", serde_json::to_string(&output)?);
            } else if reset {
                println!("Reset options for {beacon_id}");
            } else {
                println!("{beacon_id} already uses defaults");
            }
        }
    }
    Ok(())
}
