//! Command implementations.

pub mod beacons;
pub mod devices;
pub mod migrate;
pub mod options;
pub mod settings;
pub mod status;
pub mod version;

use crate::config::resolve_db_path;
use crate::error::{Error, Result};
use crate::storage::Database;
use std::path::{Path, PathBuf};

/// Resolve the store path from `--db` / `TAGSTORE_DB` or the defaults.
pub(crate) fn store_path(db_path: Option<&PathBuf>) -> Result<PathBuf> {
    resolve_db_path(db_path.map(PathBuf::as_path)).ok_or(Error::NotInitialized)
}

/// Open an existing store. Only `migrate` creates one.
pub(crate) fn open_existing(db_path: Option<&PathBuf>) -> Result<(PathBuf, Database)> {
    let path = store_path(db_path)?;
    if !path.exists() {
        return Err(Error::NotInitialized);
    }
    let db = Database::open_path(&path)?;
    Ok((path, db))
}

pub(crate) fn display_path(path: &Path) -> String {
    path.display().to_string()
}
