//! Settings store.
//!
//! The single [`UserSettings`] record is persisted as a key bag in the
//! `UserSettings` table: one row per configured field, no row for an
//! unset field.

use crate::error::Result;
use crate::model::{SettingKey, UserSettings};
use crate::storage::sqlite::DbPool;
use rusqlite::{Connection, TransactionBehavior};
use tracing::debug;

/// Reads and writes the settings record.
#[derive(Clone)]
pub struct SettingsStore {
    pool: DbPool,
}

impl SettingsStore {
    pub(crate) fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Load the current settings. Absent keys come back as `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored flag is unreadable.
    pub fn load(&self) -> Result<UserSettings> {
        let conn = self.pool.get()?;
        read(&conn)
    }

    /// Replace the stored settings with `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::error::Error::InvalidArgument)
    /// if validation fails (nothing is written), or a storage error.
    pub fn save(&self, settings: &UserSettings) -> Result<()> {
        settings.validate()?;
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        write(&tx, settings)?;
        tx.commit()?;
        debug!("Saved user settings");
        Ok(())
    }

    /// Read-modify-write the settings in one transaction.
    ///
    /// Returns the settings as saved. If `f` produces invalid settings the
    /// transaction is rolled back.
    ///
    /// # Errors
    ///
    /// Returns any error from `f`, validation, or storage.
    pub fn update<F>(&self, f: F) -> Result<UserSettings>
    where
        F: FnOnce(&mut UserSettings) -> Result<()>,
    {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut settings = read(&tx)?;
        f(&mut settings)?;
        settings.validate()?;
        write(&tx, &settings)?;
        tx.commit()?;
        debug!("Updated user settings");
        Ok(settings)
    }

    /// Clear every setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn reset(&self) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM UserSettings", [])?;
        debug!("Reset user settings");
        Ok(())
    }
}

fn read(conn: &Connection) -> Result<UserSettings> {
    let mut stmt = conn.prepare("SELECT key, value FROM UserSettings")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut settings = UserSettings::default();
    for (key, value) in rows {
        // Keys written by a newer build are ignored.
        if let Some(key) = SettingKey::ALL.into_iter().find(|k| k.as_str() == key) {
            settings.set(key, Some(&value))?;
        }
    }
    Ok(settings)
}

fn write(conn: &Connection, settings: &UserSettings) -> Result<()> {
    let mut upsert =
        conn.prepare_cached("INSERT OR REPLACE INTO UserSettings (key, value) VALUES (?1, ?2)")?;
    let mut remove = conn.prepare_cached("DELETE FROM UserSettings WHERE key = ?1")?;

    for key in SettingKey::ALL {
        match settings.get(key) {
            Some(value) => upsert.execute([key.as_str(), value.as_str()])?,
            None => remove.execute([key.as_str()])?,
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::model::{SettingKey, UserSettings};
    use crate::storage::Database;

    #[test]
    fn test_empty_store_loads_defaults() {
        let db = Database::open_in_memory().unwrap();
        let settings = db.settings().load().unwrap();
        assert_eq!(settings, UserSettings::default());
        assert!(!settings.has_dark_theme_enabled());
        assert!(settings.fmd_account().is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let store = db.settings();
        let settings = UserSettings {
            use_dark_theme: Some(false),
            fmd_server_url: Some("https://fmd.example.org".to_string()),
            fmd_email: Some("me@example.org".to_string()),
            fmd_password: Some("hunter2".to_string()),
            language: Some("de".to_string()),
            ..UserSettings::default()
        };

        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);

        // Unset fields are removed, not kept from the previous save.
        store.save(&UserSettings::default()).unwrap();
        assert_eq!(store.load().unwrap(), UserSettings::default());
    }

    #[test]
    fn test_invalid_settings_are_not_written() {
        let db = Database::open_in_memory().unwrap();
        let store = db.settings();
        let bad = UserSettings {
            anisette_server_url: Some("ftp://ani.example.org".to_string()),
            ..UserSettings::default()
        };

        assert!(matches!(store.save(&bad), Err(Error::InvalidArgument(_))));
        assert_eq!(store.load().unwrap(), UserSettings::default());
    }

    #[test]
    fn test_padded_values_are_rejected_or_trimmed() {
        let db = Database::open_in_memory().unwrap();
        let store = db.settings();
        let padded = UserSettings {
            fmd_server_url: Some("  https://fmd.example.org \n".to_string()),
            ..UserSettings::default()
        };

        assert!(matches!(store.save(&padded), Err(Error::InvalidArgument(_))));
        assert_eq!(store.load().unwrap().fmd_server_url, None);

        let saved = store
            .update(|s| s.set(SettingKey::FmdServerUrl, Some("  https://fmd.example.org \n")))
            .unwrap();
        assert_eq!(saved.fmd_server_url.as_deref(), Some("https://fmd.example.org"));
        assert_eq!(
            store.load().unwrap().fmd_server_url.as_deref(),
            Some("https://fmd.example.org")
        );
    }

    #[test]
    fn test_update_is_read_modify_write() {
        let db = Database::open_in_memory().unwrap();
        let store = db.settings();
        store
            .save(&UserSettings {
                language: Some("en".to_string()),
                ..UserSettings::default()
            })
            .unwrap();

        let saved = store
            .update(|s| {
                s.use_dark_theme = Some(true);
                Ok(())
            })
            .unwrap();
        assert!(saved.has_dark_theme_enabled());
        assert_eq!(saved.language.as_deref(), Some("en"));
        assert_eq!(store.load().unwrap(), saved);

        let failed = store.update(|s| {
            s.language = None;
            s.fmd_server_url = Some("not a url".to_string());
            Ok(())
        });
        assert!(failed.is_err());
        assert_eq!(store.load().unwrap(), saved);

        store.reset().unwrap();
        assert_eq!(store.load().unwrap(), UserSettings::default());
    }
}
