//! Database migrations embedded at compile time.
//!
//! Migrations are sourced from `/migrations/` at the crate root and
//! embedded into the binary using `include_str!`. Each one moves the store
//! from version `N - 1` to `N`.
//!
//! The version marker is SQLite's `user_version` header field (0 for a new
//! file). The `schema_migrations` table keeps a ledger of when each step
//! was applied. Both are written inside the step's transaction, so a failed
//! step leaves the store exactly at the previous version.

use crate::error::{Error, Result};
use crate::storage::schema::SCHEMA_MIGRATIONS_TABLE;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info};

/// A single migration with version number and SQL content.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    sql: &'static str,
}

/// All migrations in order, embedded at compile time.
///
/// Versions are contiguous from 1. Every statement uses `IF NOT EXISTS` so
/// a step that was interrupted and retried does not trip over objects it
/// already created.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "001_apple_beacons",
        sql: include_str!("../../migrations/001_apple_beacons.sql"),
    },
    Migration {
        version: 2,
        name: "002_google_devices",
        sql: include_str!("../../migrations/002_google_devices.sql"),
    },
    Migration {
        version: 3,
        name: "003_user_settings",
        sql: include_str!("../../migrations/003_user_settings.sql"),
    },
];

/// Outcome of bringing a store up to date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Version found on disk before migrating.
    pub from: u32,
    /// Version after migrating.
    pub to: u32,
    /// Versions applied by this run, in order.
    pub applied: Vec<u32>,
}

impl MigrationReport {
    /// Returns true if no migration had to run.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Latest schema version this build knows about.
#[must_use]
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Read the on-disk schema version (0 for a new store).
///
/// # Errors
///
/// Returns an error if the header cannot be read.
pub fn current_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Apply every pending migration.
///
/// Idempotent: a store already at the latest version is left untouched.
///
/// # Errors
///
/// Returns [`Error::MigrationFailure`] if a step fails (that step is rolled
/// back), or [`Error::SchemaTooNew`] if the store was written by a newer
/// build.
pub fn run_migrations(conn: &mut Connection) -> Result<MigrationReport> {
    apply(conn, MIGRATIONS, latest_version())
}

/// Apply pending migrations up to and including `target`.
///
/// # Errors
///
/// Same as [`run_migrations`], plus [`Error::InvalidArgument`] if `target`
/// is not a registered version.
pub fn migrate_to(conn: &mut Connection, target: u32) -> Result<MigrationReport> {
    if target > latest_version() {
        return Err(Error::InvalidArgument(format!(
            "unknown schema version {target} (latest is {})",
            latest_version()
        )));
    }
    apply(conn, MIGRATIONS, target)
}

fn apply(conn: &mut Connection, migrations: &[Migration], target: u32) -> Result<MigrationReport> {
    let from = current_version(conn)?;
    let latest = migrations.last().map_or(0, |m| m.version);
    if from > latest {
        return Err(Error::SchemaTooNew {
            found: from,
            latest,
        });
    }

    let mut applied = Vec::new();

    for migration in migrations
        .iter()
        .filter(|m| m.version > from && m.version <= target)
    {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );

        apply_one(conn, migration).map_err(|source| Error::MigrationFailure {
            version: migration.version,
            source,
        })?;
        applied.push(migration.version);

        info!(version = migration.version, "Migration complete");
    }

    let to = current_version(conn)?;
    debug!(from, to, applied = applied.len(), "Schema up to date");

    Ok(MigrationReport { from, to, applied })
}

/// Run one step in a single IMMEDIATE transaction.
///
/// Dropping the transaction on any `?` rolls the step back.
fn apply_one(conn: &mut Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {SCHEMA_MIGRATIONS_TABLE} (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        )"
    ))?;

    tx.execute_batch(migration.sql)?;

    tx.execute(
        &format!(
            "INSERT OR REPLACE INTO {SCHEMA_MIGRATIONS_TABLE} (version, name, applied_at)
             VALUES (?1, ?2, ?3)"
        ),
        rusqlite::params![
            migration.version,
            migration.name,
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    tx.pragma_update(None, "user_version", migration.version)?;

    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::{
        table_exists, tables_for_version, GOOGLE_DEVICES, OWNED_BEACONS, USER_SETTINGS,
    };

    fn ledger_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap()
    }

    fn schema_objects(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT sql FROM sqlite_master WHERE sql IS NOT NULL ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap()
    }

    #[test]
    fn test_migrations_are_contiguous() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, i + 1, "{}", migration.name);
        }
        assert_eq!(latest_version(), 3);
    }

    #[test]
    fn test_run_migrations_fresh_db() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(current_version(&conn).unwrap(), 0);

        let report = run_migrations(&mut conn).expect("Migrations should apply to fresh database");
        assert_eq!(report.from, 0);
        assert_eq!(report.to, latest_version());
        assert_eq!(report.applied, vec![1, 2, 3]);

        for table in tables_for_version(latest_version()) {
            assert!(table_exists(&conn, table.name).unwrap(), "{}", table.name);
        }
        assert_eq!(ledger_count(&conn), 3);
    }

    #[test]
    fn test_run_migrations_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).expect("First run should succeed");
        let before = schema_objects(&conn);

        let report = run_migrations(&mut conn).expect("Second run should succeed");
        assert!(report.is_noop());
        assert_eq!(report.from, report.to);
        assert_eq!(current_version(&conn).unwrap(), latest_version());
        assert_eq!(schema_objects(&conn), before);
        assert_eq!(ledger_count(&conn), 3);
    }

    #[test]
    fn test_v1_to_v2_keeps_beacon_rows() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_to(&mut conn, 1).unwrap();
        assert!(!table_exists(&conn, GOOGLE_DEVICES).unwrap());

        for i in 0..5 {
            conn.execute(
                "INSERT INTO OwnedBeacons (id, name, key_material, imported_at) VALUES (?1, ?2, 'k', ?3)",
                rusqlite::params![format!("b{i}"), format!("Tag {i}"), i],
            )
            .unwrap();
        }
        let snapshot = |conn: &Connection| -> Vec<(String, String, i64)> {
            conn.prepare("SELECT id, name, imported_at FROM OwnedBeacons ORDER BY id")
                .unwrap()
                .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
                .unwrap()
                .collect::<rusqlite::Result<_>>()
                .unwrap()
        };
        let before = snapshot(&conn);

        let report = migrate_to(&mut conn, 2).unwrap();
        assert_eq!(report.applied, vec![2]);
        assert_eq!(snapshot(&conn), before);

        let devices: i64 = conn
            .query_row("SELECT COUNT(*) FROM GoogleDevices", [], |r| r.get(0))
            .unwrap();
        assert_eq!(devices, 0);
        assert!(!table_exists(&conn, USER_SETTINGS).unwrap());
    }

    #[test]
    fn test_failed_migration_rolls_back() {
        const BROKEN: &[Migration] = &[
            Migration {
                version: 1,
                name: "001_ok",
                sql: "CREATE TABLE IF NOT EXISTS first (id TEXT PRIMARY KEY);",
            },
            Migration {
                version: 2,
                name: "002_broken",
                sql: "CREATE TABLE IF NOT EXISTS second (id TEXT PRIMARY KEY);
                      INSERT INTO no_such_table VALUES (1);",
            },
        ];

        let mut conn = Connection::open_in_memory().unwrap();
        let err = apply(&mut conn, BROKEN, 2).unwrap_err();

        assert!(matches!(err, Error::MigrationFailure { version: 2, .. }));
        assert_eq!(current_version(&conn).unwrap(), 1);
        assert!(table_exists(&conn, "first").unwrap());
        assert!(!table_exists(&conn, "second").unwrap());
        assert_eq!(ledger_count(&conn), 1);
    }

    #[test]
    fn test_newer_store_is_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", latest_version() + 1).unwrap();

        let err = run_migrations(&mut conn).unwrap_err();
        assert!(matches!(err, Error::SchemaTooNew { .. }));
        assert!(!table_exists(&conn, OWNED_BEACONS).unwrap());
    }

    #[test]
    fn test_migrate_to_rejects_unknown_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert!(matches!(
            migrate_to(&mut conn, 99),
            Err(Error::InvalidArgument(_))
        ));
    }
}
