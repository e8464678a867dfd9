//! Settings command implementations.

use crate::cli::commands::open_existing;
use crate::cli::SettingsCommands;
use crate::error::{Error, Result};
use crate::model::SettingKey;
use crate::validate::normalize_setting_key;
use std::path::PathBuf;

/// Execute settings commands.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for unknown keys or invalid values.
pub fn execute(command: &SettingsCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let (_, db) = open_existing(db_path)?;
    let store = db.settings();

    let settings = match command {
        SettingsCommands::Show => store.load()?,
        SettingsCommands::Set { key, value } => {
            let key = resolve_key(key)?;
            store.update(|s| s.set(key, Some(value.as_str())))?
        }
        SettingsCommands::Unset { key } => {
            let key = resolve_key(key)?;
            store.update(|s| s.set(key, None))?
        }
    };

    let shown = settings.redacted();
    if json {
        println!("{}", serde_json::to_string(&shown)?);
        return Ok(());
    }

    for key in SettingKey::ALL {
        let value = shown.get(key).unwrap_or_else(|| "-".to_string());
        println!("{:<20} {value}", key.as_str());
    }
    Ok(())
}

fn resolve_key(input: &str) -> Result<SettingKey> {
    normalize_setting_key(input).map_err(|(input, suggestion)| {
        Error::InvalidArgument(match suggestion {
            Some(suggestion) => {
                format!("unknown setting key '{input}', did you mean '{suggestion}'?")
            }
            None => format!("unknown setting key '{input}'"),
        })
    })
}
