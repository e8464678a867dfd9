//! Schema registry: which tables exist at which schema version.
//!
//! The DDL itself lives in `/migrations/*.sql`; this module only records
//! the resulting table set and the per-connection pragmas.

use rusqlite::{Connection, Result};
use std::time::Duration;

/// Ledger of applied migrations.
pub const SCHEMA_MIGRATIONS_TABLE: &str = "schema_migrations";

pub const IMPORTS: &str = "Imports";
pub const OWNED_BEACONS: &str = "OwnedBeacons";
pub const BEACON_NAMING_RECORDS: &str = "BeaconNamingRecords";
pub const LOCATION_REPORTS: &str = "LocationReports";
pub const DAILY_HISTORY_FETCH_RECORDS: &str = "DailyHistoryFetchRecords";
pub const USER_BEACON_OPTIONS: &str = "UserBeaconOptions";
pub const GOOGLE_DEVICES: &str = "GoogleDevices";
pub const USER_SETTINGS: &str = "UserSettings";

/// An entity table and the schema version that introduced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub introduced_in: u32,
}

/// Every entity table, in creation order.
pub const TABLES: &[TableDef] = &[
    TableDef { name: IMPORTS, introduced_in: 1 },
    TableDef { name: OWNED_BEACONS, introduced_in: 1 },
    TableDef { name: BEACON_NAMING_RECORDS, introduced_in: 1 },
    TableDef { name: LOCATION_REPORTS, introduced_in: 1 },
    TableDef { name: DAILY_HISTORY_FETCH_RECORDS, introduced_in: 1 },
    TableDef { name: USER_BEACON_OPTIONS, introduced_in: 1 },
    TableDef { name: GOOGLE_DEVICES, introduced_in: 2 },
    TableDef { name: USER_SETTINGS, introduced_in: 3 },
];

/// Tables that must exist once a store reaches `version`.
pub fn tables_for_version(version: u32) -> impl Iterator<Item = &'static TableDef> {
    TABLES.iter().filter(move |t| t.introduced_in <= version)
}

/// Set the pragmas every connection needs.
///
/// WAL gives readers a consistent snapshot while a writer is mid-transaction.
/// It is a no-op for in-memory databases.
pub fn apply_pragmas(conn: &Connection, busy_timeout: Duration) -> Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    Ok(())
}

/// Check if a table exists.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?
        .exists([table])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_for_version() {
        let v1: Vec<_> = tables_for_version(1).map(|t| t.name).collect();
        assert_eq!(v1.len(), 6);
        assert!(!v1.contains(&GOOGLE_DEVICES));

        let v2: Vec<_> = tables_for_version(2).map(|t| t.name).collect();
        assert!(v2.contains(&GOOGLE_DEVICES));
        assert!(!v2.contains(&USER_SETTINGS));

        assert_eq!(tables_for_version(3).count(), TABLES.len());
    }

    #[test]
    fn test_introspection_helpers() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn, Duration::from_secs(1)).unwrap();
        conn.execute_batch("CREATE TABLE t (a INTEGER, b TEXT)").unwrap();

        assert!(table_exists(&conn, "t").unwrap());
        assert!(!table_exists(&conn, "missing").unwrap());
    }
}
