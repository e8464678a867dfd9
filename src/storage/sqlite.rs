//! SQLite store and its lifecycle.
//!
//! [`Database`] owns a connection pool over one SQLite file. Opening it
//! brings the schema up to date before any repository can be handed out;
//! afterwards it is cheap to clone and safe to share across threads.
//!
//! [`DatabaseHandle`] is the injectable lazy wrapper: the store is opened
//! on first use and reused until [`DatabaseHandle::close`].

use crate::config::{Location, StoreConfig};
use crate::error::{Error, Result};
use crate::model::{
    BeaconId, BeaconNamingRecord, DailyHistoryFetchRecord, GoogleDevice, Import, ImportBundle,
    ImportStatus, LocationReport, OwnedBeacon, UserBeaconOptions,
};
use crate::storage::migrations::{current_version, latest_version, run_migrations, MigrationReport};
use crate::storage::repository::{Entity, Repository};
use crate::storage::schema::{apply_pragmas, tables_for_version};
use crate::storage::settings::SettingsStore;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Transaction, TransactionBehavior};
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Connection pool over the store.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Row count of one table, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: &'static str,
    pub rows: usize,
}

/// An open, migrated store.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    location: Location,
    migration: MigrationReport,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("location", &self.location)
            .field("migration", &self.migration)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open the store described by `config`, creating it if needed.
    ///
    /// Pending migrations run to completion on a pooled connection before
    /// this returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageUnavailable`] if the file cannot be created
    /// or opened, [`Error::MigrationFailure`] or [`Error::SchemaTooNew`] if
    /// the schema cannot be brought up to date.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let busy_timeout = config.busy_timeout;
        let (manager, max_size) = match &config.location {
            Location::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        Error::StorageUnavailable(format!("{}: {e}", parent.display()))
                    })?;
                }
                (SqliteConnectionManager::file(path), config.pool_size.max(1))
            }
            // Every connection to ":memory:" is its own database, so the
            // pool must hand out the same one every time.
            Location::Memory => (SqliteConnectionManager::memory(), 1),
        };
        let manager = manager.with_init(move |conn| apply_pragmas(conn, busy_timeout));

        let pool = Pool::builder()
            .max_size(max_size)
            .connection_timeout(busy_timeout.max(std::time::Duration::from_secs(1)))
            .idle_timeout(None)
            .max_lifetime(None)
            .build(manager)
            .map_err(|e| Error::StorageUnavailable(format!("failed to create connection pool: {e}")))?;
        debug!(location = ?config.location, max_size, "Created connection pool");

        let migration = {
            let mut conn = pool.get()?;
            run_migrations(&mut conn)?
        };
        if !migration.is_noop() {
            info!(
                from = migration.from,
                to = migration.to,
                "Store schema upgraded"
            );
        }

        Ok(Self {
            pool,
            location: config.location.clone(),
            migration,
        })
    }

    /// Open a file-backed store with default tuning.
    ///
    /// # Errors
    ///
    /// Same as [`Database::open`].
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(&StoreConfig::file(path))
    }

    /// Open a private in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Same as [`Database::open`].
    pub fn open_in_memory() -> Result<Self> {
        Self::open(&StoreConfig::memory())
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// What opening this store had to migrate.
    #[must_use]
    pub fn migration_report(&self) -> &MigrationReport {
        &self.migration
    }

    // ==================
    // Repositories
    // ==================

    fn repository<E: Entity>(&self) -> Repository<E> {
        Repository::new(self.pool.clone())
    }

    #[must_use]
    pub fn imports(&self) -> Repository<Import> {
        self.repository()
    }

    #[must_use]
    pub fn owned_beacons(&self) -> Repository<OwnedBeacon> {
        self.repository()
    }

    #[must_use]
    pub fn naming_records(&self) -> Repository<BeaconNamingRecord> {
        self.repository()
    }

    #[must_use]
    pub fn location_reports(&self) -> Repository<LocationReport> {
        self.repository()
    }

    #[must_use]
    pub fn daily_fetches(&self) -> Repository<DailyHistoryFetchRecord> {
        self.repository()
    }

    #[must_use]
    pub fn beacon_options(&self) -> Repository<UserBeaconOptions> {
        self.repository()
    }

    #[must_use]
    pub fn google_devices(&self) -> Repository<GoogleDevice> {
        self.repository()
    }

    #[must_use]
    pub fn settings(&self) -> SettingsStore {
        SettingsStore::new(self.pool.clone())
    }

    // ==================
    // Transactions
    // ==================

    /// Run a multi-statement write in one IMMEDIATE transaction.
    ///
    /// The closure's writes commit together or not at all. Use the
    /// repositories' transaction-scoped helpers inside it, never the
    /// repositories themselves (they would check out a second connection).
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or a storage error; either way the
    /// transaction is rolled back.
    pub fn mutate<F, R>(&self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        debug!(op, "Committed");
        Ok(result)
    }

    // ==================
    // Cross-entity operations
    // ==================

    /// Store everything one import produced, atomically.
    ///
    /// The import row is written as completed together with its beacons and
    /// naming records. If any row fails, none are written.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails.
    pub fn record_import(&self, bundle: ImportBundle) -> Result<Import> {
        let ImportBundle {
            mut import,
            beacons,
            naming_records,
        } = bundle;
        import.status = ImportStatus::Completed;

        self.mutate("record_import", |tx| {
            Repository::<Import>::upsert_in(tx, std::slice::from_ref(&import))?;
            Repository::<OwnedBeacon>::upsert_in(tx, &beacons)?;
            Repository::<BeaconNamingRecord>::upsert_in(tx, &naming_records)?;
            Ok(())
        })?;

        info!(
            import = %import.id,
            beacons = beacons.len(),
            naming_records = naming_records.len(),
            "Recorded import"
        );
        Ok(import)
    }

    /// Remove an owned beacon and its customization row.
    ///
    /// Naming records, location reports and fetch records stay behind as
    /// orphans; see [`Database::orphaned_beacon_ids`]. Returns false if the
    /// beacon was unknown, in which case nothing is deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn forget_beacon(&self, id: &BeaconId) -> Result<bool> {
        let removed = self.mutate("forget_beacon", |tx| {
            if Repository::<OwnedBeacon>::delete_in(tx, id, 0)? == 0 {
                return Ok(false);
            }
            Repository::<UserBeaconOptions>::delete_in(tx, id, 0)?;
            Ok(true)
        })?;
        if removed {
            info!(beacon = %id, "Forgot beacon");
        }
        Ok(removed)
    }

    /// Beacon ids referenced by naming records or location reports that
    /// have no owned beacon row, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn orphaned_beacon_ids(&self) -> Result<Vec<BeaconId>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT beacon_id FROM BeaconNamingRecords
             UNION
             SELECT beacon_id FROM LocationReports
             EXCEPT
             SELECT id FROM OwnedBeacons
             ORDER BY 1",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<BeaconId>>>()?;
        Ok(ids)
    }

    // ==================
    // Diagnostics
    // ==================

    /// Schema version recorded in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be read.
    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.pool.get()?;
        current_version(&conn)
    }

    /// Row counts for every entity table.
    ///
    /// # Errors
    ///
    /// Returns an error if a count fails.
    pub fn table_counts(&self) -> Result<Vec<TableCount>> {
        let conn = self.pool.get()?;
        tables_for_version(latest_version())
            .map(|table| -> Result<TableCount> {
                let rows: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM {}", table.name),
                    [],
                    |row| row.get(0),
                )?;
                Ok(TableCount {
                    table: table.name,
                    rows: usize::try_from(rows).unwrap_or_default(),
                })
            })
            .collect()
    }
}

/// Lazily opened, shareable access to the store.
///
/// Inject one of these where a process-wide singleton would otherwise be
/// used. The first [`acquire`](Self::acquire) opens and migrates the store;
/// concurrent first calls are serialized so migrations run once.
#[derive(Debug)]
pub struct DatabaseHandle {
    config: StoreConfig,
    slot: Mutex<Option<Database>>,
}

impl DatabaseHandle {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            slot: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The open store, opening it on first use.
    ///
    /// # Errors
    ///
    /// Returns the error from [`Database::open`]. A failed open leaves the
    /// handle closed, so a later call tries again.
    pub fn acquire(&self) -> Result<Database> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(db) = slot.as_ref() {
            return Ok(db.clone());
        }
        let db = Database::open(&self.config)?;
        *slot = Some(db.clone());
        Ok(db)
    }

    /// Drop the handle's store. Clones already handed out stay usable until
    /// they are dropped; the next `acquire` reopens.
    pub fn close(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.take().is_some() {
            debug!("Closed store handle");
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImportId, NamingRecordId};
    use crate::storage::schema::{GOOGLE_DEVICES, OWNED_BEACONS};
    use rusqlite::Connection;
    use std::sync::Arc;
    use std::thread;

    fn beacon(id: &str) -> OwnedBeacon {
        OwnedBeacon {
            id: BeaconId::new(id),
            import_id: None,
            name: Some(id.to_uppercase()),
            key_material: "a2V5".to_string(),
            imported_at: 1,
        }
    }

    fn naming(id: &str, beacon_id: &str) -> BeaconNamingRecord {
        BeaconNamingRecord {
            id: NamingRecordId::new(id),
            beacon_id: BeaconId::new(beacon_id),
            import_id: None,
            name: "Backpack".to_string(),
            emoji: Some("🎒".to_string()),
            created_at: 5,
        }
    }

    #[test]
    fn test_open_creates_parent_dirs_and_migrates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("store.db");

        let db = Database::open_path(&path).unwrap();
        assert!(path.exists());
        assert_eq!(db.schema_version().unwrap(), latest_version());
        assert_eq!(db.migration_report().applied, vec![1, 2, 3]);

        let counts = db.table_counts().unwrap();
        assert!(counts.iter().any(|c| c.table == GOOGLE_DEVICES && c.rows == 0));
        drop(db);

        let reopened = Database::open_path(&path).unwrap();
        assert!(reopened.migration_report().is_noop());
    }

    #[test]
    fn test_open_upgrades_v1_store_and_keeps_beacons() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.db");
        {
            let mut conn = Connection::open(&path).unwrap();
            crate::storage::migrations::migrate_to(&mut conn, 1).unwrap();
            conn.execute(
                "INSERT INTO OwnedBeacons (id, name, key_material, imported_at) VALUES ('b1', 'Keys', 'k', 1)",
                [],
            )
            .unwrap();
        }

        let db = Database::open_path(&path).unwrap();
        assert_eq!(db.migration_report().from, 1);
        assert_eq!(db.owned_beacons().get_all().unwrap().len(), 1);
        assert!(db.google_devices().get_all().unwrap().is_empty());
    }

    #[test]
    fn test_open_refuses_newer_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", latest_version() + 1)
                .unwrap();
        }

        let err = Database::open_path(&path).unwrap_err();
        assert!(matches!(err, Error::SchemaTooNew { .. }));
    }

    #[test]
    fn test_record_import_is_atomic() {
        let db = Database::open_in_memory().unwrap();
        let import = Import::from_payload("AirTags.plist", b"payload", 10);
        let import_id = import.id.clone();

        let stored = db
            .record_import(
                ImportBundle::new(import)
                    .with_beacon(beacon("b1"))
                    .with_beacon(beacon("b2"))
                    .with_naming_record(naming("n1", "b1")),
            )
            .unwrap();
        assert_eq!(stored.status, ImportStatus::Completed);
        assert_eq!(db.owned_beacons().get_by_import(&import_id).unwrap().len(), 2);
        assert_eq!(
            db.imports()
                .get_by_content_hash(stored.content_hash.as_deref().unwrap())
                .unwrap()
                .map(|i| i.id),
            Some(import_id)
        );

        // A rejected naming record aborts the whole bundle.
        let mut broken = naming("n2", "b3");
        broken.name = String::new();
        let failing = Import::from_payload("other.plist", b"other", 20);
        let failing_id = failing.id.clone();
        db.mutate("break_names", |tx| {
            tx.execute_batch(
                "CREATE TRIGGER reject_blank BEFORE INSERT ON BeaconNamingRecords
                 WHEN NEW.name = '' BEGIN SELECT RAISE(ABORT, 'blank name'); END",
            )?;
            Ok(())
        })
        .unwrap();

        let result = db.record_import(
            ImportBundle::new(failing)
                .with_beacon(beacon("b3"))
                .with_naming_record(broken),
        );
        assert!(result.is_err());
        assert!(db.imports().get_by_id(&failing_id).unwrap().is_none());
        assert!(db.owned_beacons().get_by_id(&BeaconId::new("b3")).unwrap().is_none());
        assert_eq!(db.owned_beacons().count().unwrap(), 2);
        assert!(db.imports().get_by_id(&ImportId::new("missing")).unwrap().is_none());
    }

    #[test]
    fn test_forget_beacon_leaves_orphans() {
        let db = Database::open_in_memory().unwrap();
        let id = BeaconId::new("b1");
        db.owned_beacons().upsert_all(&[beacon("b1"), beacon("b2")]).unwrap();
        db.naming_records().upsert(&naming("n1", "b1")).unwrap();
        db.location_reports()
            .upsert(&LocationReport::new(id.clone(), 100, 1.0, 2.0))
            .unwrap();
        db.beacon_options()
            .upsert(&UserBeaconOptions::defaults_for(id.clone()))
            .unwrap();
        assert!(db.orphaned_beacon_ids().unwrap().is_empty());

        assert!(db.forget_beacon(&id).unwrap());
        assert!(!db.forget_beacon(&id).unwrap());

        assert!(db.beacon_options().get_by_beacon_id(&id).unwrap().is_none());
        assert_eq!(db.naming_records().get_for_beacon(&id).unwrap().len(), 1);
        assert_eq!(db.location_reports().count().unwrap(), 1);
        assert_eq!(db.orphaned_beacon_ids().unwrap(), vec![id]);
    }

    #[test]
    fn test_orphans_are_tolerated_on_insert() {
        let db = Database::open_in_memory().unwrap();
        db.naming_records().upsert(&naming("n1", "ghost")).unwrap();
        db.location_reports()
            .upsert(&LocationReport::new(BeaconId::new("ghost"), 1, 0.0, 0.0))
            .unwrap();

        assert_eq!(db.orphaned_beacon_ids().unwrap(), vec![BeaconId::new("ghost")]);
    }

    #[test]
    fn test_table_counts_cover_every_table() {
        let db = Database::open_in_memory().unwrap();
        db.owned_beacons().upsert(&beacon("b1")).unwrap();

        let counts = db.table_counts().unwrap();
        assert_eq!(counts.len(), tables_for_version(latest_version()).count());
        let owned = counts.iter().find(|c| c.table == OWNED_BEACONS).unwrap();
        assert_eq!(owned.rows, 1);
    }

    #[test]
    fn test_handle_opens_once() {
        let handle = DatabaseHandle::new(StoreConfig::memory());
        assert!(!handle.is_open());

        let first = handle.acquire().unwrap();
        first.owned_beacons().upsert(&beacon("b1")).unwrap();

        // A second open of an in-memory store would be empty.
        let second = handle.acquire().unwrap();
        assert_eq!(second.owned_beacons().count().unwrap(), 1);
        assert!(handle.is_open());

        drop((first, second));
        handle.close();
        assert!(!handle.is_open());
        let reopened = handle.acquire().unwrap();
        assert_eq!(reopened.owned_beacons().count().unwrap(), 0);
    }

    #[test]
    fn test_failed_migration_reaches_acquire() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocked.db");
        {
            let mut conn = Connection::open(&path).unwrap();
            crate::storage::migrations::migrate_to(&mut conn, 2).unwrap();
            // Occupies the name migration 3 needs for its table.
            conn.execute_batch("CREATE INDEX UserSettings ON OwnedBeacons(id)")
                .unwrap();
        }

        let handle = DatabaseHandle::new(StoreConfig::file(&path));
        let err = handle.acquire().unwrap_err();
        assert!(matches!(err, Error::MigrationFailure { version: 3, .. }));
        assert_eq!(err.exit_code(), 2);
        assert!(!handle.is_open());

        let conn = Connection::open(&path).unwrap();
        assert_eq!(current_version(&conn).unwrap(), 2);
    }

    #[test]
    fn test_forget_unknown_beacon_keeps_options() {
        let db = Database::open_in_memory().unwrap();
        let id = BeaconId::new("never-owned");
        let options = UserBeaconOptions {
            ui_name: Some("Spare".to_string()),
            ..UserBeaconOptions::defaults_for(id.clone())
        };
        db.beacon_options().upsert(&options).unwrap();

        assert!(!db.forget_beacon(&id).unwrap());
        assert_eq!(db.beacon_options().get_by_beacon_id(&id).unwrap(), Some(options));
    }

    #[test]
    fn test_handle_concurrent_first_acquire() {
        let dir = tempfile::tempdir().unwrap();
        let handle = Arc::new(DatabaseHandle::new(StoreConfig::file(
            dir.path().join("shared.db"),
        )));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let handle = Arc::clone(&handle);
                thread::spawn(move || handle.acquire().unwrap().schema_version().unwrap())
            })
            .collect();

        for worker in workers {
            assert_eq!(worker.join().unwrap(), latest_version());
        }
        let db = handle.acquire().unwrap();
        let ledger: i64 = db
            .mutate("count_ledger", |tx| {
                Ok(tx.query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(ledger, i64::from(latest_version()));
    }
}
