//! Table mappings and entity-specific queries.
//!
//! One [`Entity`] impl per table, followed by the narrow queries each
//! repository offers on top of the generic contract.

use crate::error::Result;
use crate::model::location::{format_day, parse_day};
use crate::model::{
    BeaconId, BeaconNamingRecord, CanonicId, DailyHistoryFetchRecord, DeviceSyncReport,
    GoogleDevice, Import, ImportId, ImportStatus, LocationReport, NamingRecordId, OwnedBeacon,
    UserBeaconOptions,
};
use crate::storage::repository::{opt_int, opt_text, DeletionPolicy, Entity, Repository};
use crate::storage::schema;
use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{OptionalExtension, Row};
use std::collections::HashSet;
use tracing::{debug, warn};

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn day_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    parse_day(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ==================
// Imports
// ==================

impl Entity for Import {
    type Key = ImportId;

    const NAME: &'static str = "import";
    const TABLE: &'static str = schema::IMPORTS;
    const COLUMNS: &'static [&'static str] =
        &["id", "source_ref", "content_hash", "imported_at", "status"];
    const KEY_COLUMNS: &'static [&'static str] = &["id"];
    const DELETION: DeletionPolicy = DeletionPolicy::Hard;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get(4)?;
        Ok(Self {
            id: row.get(0)?,
            source_ref: row.get(1)?,
            content_hash: row.get(2)?,
            imported_at: row.get(3)?,
            status: ImportStatus::parse(&status),
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            text(self.id.as_str()),
            text(&self.source_ref),
            opt_text(self.content_hash.as_deref()),
            Value::Integer(self.imported_at),
            text(self.status.as_str()),
        ]
    }

    fn key_values(key: &ImportId) -> Vec<Value> {
        vec![text(key.as_str())]
    }
}

impl Repository<Import> {
    /// Find an earlier import of the same payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_by_content_hash(&self, hash: &str) -> Result<Option<Import>> {
        let conn = self.pool().get()?;
        let mut found = Self::select_ordered(
            &conn,
            "content_hash = ?1",
            "imported_at DESC",
            vec![text(hash)],
        )?;
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.swap_remove(0))
        })
    }

    /// Update an import's status. Returns false if the import is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_status(&self, id: &ImportId, status: ImportStatus) -> Result<bool> {
        let changed = self.write(|conn| {
            Ok(conn.execute(
                "UPDATE Imports SET status = ?1 WHERE id = ?2",
                rusqlite::params![status.as_str(), id],
            )?)
        })?;
        Ok(changed > 0)
    }
}

// ==================
// Owned beacons
// ==================

impl Entity for OwnedBeacon {
    type Key = BeaconId;

    const NAME: &'static str = "beacon";
    const TABLE: &'static str = schema::OWNED_BEACONS;
    const COLUMNS: &'static [&'static str] =
        &["id", "import_id", "name", "key_material", "imported_at"];
    const KEY_COLUMNS: &'static [&'static str] = &["id"];
    const DELETION: DeletionPolicy = DeletionPolicy::Hard;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            import_id: row.get(1)?,
            name: row.get(2)?,
            key_material: row.get(3)?,
            imported_at: row.get(4)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            text(self.id.as_str()),
            opt_text(self.import_id.as_ref().map(ImportId::as_str)),
            opt_text(self.name.as_deref()),
            text(&self.key_material),
            Value::Integer(self.imported_at),
        ]
    }

    fn key_values(key: &BeaconId) -> Vec<Value> {
        vec![text(key.as_str())]
    }
}

impl Repository<OwnedBeacon> {
    /// Beacons produced by one import.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_by_import(&self, import_id: &ImportId) -> Result<Vec<OwnedBeacon>> {
        let conn = self.pool().get()?;
        Self::select(&conn, "import_id = ?1", vec![text(import_id.as_str())])
    }
}

// ==================
// Naming records
// ==================

impl Entity for BeaconNamingRecord {
    type Key = NamingRecordId;

    const NAME: &'static str = "naming record";
    const TABLE: &'static str = schema::BEACON_NAMING_RECORDS;
    const COLUMNS: &'static [&'static str] =
        &["id", "beacon_id", "import_id", "name", "emoji", "created_at"];
    const KEY_COLUMNS: &'static [&'static str] = &["id"];
    const DELETION: DeletionPolicy = DeletionPolicy::Hard;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            beacon_id: row.get(1)?,
            import_id: row.get(2)?,
            name: row.get(3)?,
            emoji: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            text(self.id.as_str()),
            text(self.beacon_id.as_str()),
            opt_text(self.import_id.as_ref().map(ImportId::as_str)),
            text(&self.name),
            opt_text(self.emoji.as_deref()),
            Value::Integer(self.created_at),
        ]
    }

    fn key_values(key: &NamingRecordId) -> Vec<Value> {
        vec![text(key.as_str())]
    }
}

impl Repository<BeaconNamingRecord> {
    /// Naming records for a beacon, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_for_beacon(&self, beacon_id: &BeaconId) -> Result<Vec<BeaconNamingRecord>> {
        let conn = self.pool().get()?;
        Self::select_ordered(
            &conn,
            "beacon_id = ?1",
            "created_at DESC, id",
            vec![text(beacon_id.as_str())],
        )
    }
}

// ==================
// Location reports
// ==================

impl Entity for LocationReport {
    type Key = (BeaconId, i64);

    const NAME: &'static str = "location report";
    const TABLE: &'static str = schema::LOCATION_REPORTS;
    const COLUMNS: &'static [&'static str] = &[
        "beacon_id",
        "timestamp",
        "latitude",
        "longitude",
        "horizontal_accuracy",
        "confidence",
        "status",
        "battery_level",
        "published_at",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["beacon_id", "timestamp"];
    const DELETION: DeletionPolicy = DeletionPolicy::Hard;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            beacon_id: row.get(0)?,
            timestamp: row.get(1)?,
            latitude: row.get(2)?,
            longitude: row.get(3)?,
            horizontal_accuracy: row.get(4)?,
            confidence: row.get(5)?,
            status: row.get(6)?,
            battery_level: row.get(7)?,
            published_at: row.get(8)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            text(self.beacon_id.as_str()),
            Value::Integer(self.timestamp),
            Value::Real(self.latitude),
            Value::Real(self.longitude),
            Value::Real(self.horizontal_accuracy),
            opt_int(self.confidence),
            opt_int(self.status),
            opt_text(self.battery_level.as_deref()),
            opt_int(self.published_at),
        ]
    }

    fn key_values((beacon_id, timestamp): &(BeaconId, i64)) -> Vec<Value> {
        vec![text(beacon_id.as_str()), Value::Integer(*timestamp)]
    }
}

impl Repository<LocationReport> {
    /// Fixes for a beacon with `since <= timestamp < until`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_for_beacon(
        &self,
        beacon_id: &BeaconId,
        since: i64,
        until: i64,
    ) -> Result<Vec<LocationReport>> {
        let conn = self.pool().get()?;
        Self::select(
            &conn,
            "beacon_id = ?1 AND timestamp >= ?2 AND timestamp < ?3",
            vec![
                text(beacon_id.as_str()),
                Value::Integer(since),
                Value::Integer(until),
            ],
        )
    }

    /// The most recent fix for a beacon.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_latest_for_beacon(&self, beacon_id: &BeaconId) -> Result<Option<LocationReport>> {
        let conn = self.pool().get()?;
        let sql = format!(
            "SELECT {} FROM LocationReports WHERE beacon_id = ?1 ORDER BY timestamp DESC LIMIT 1",
            <LocationReport as Entity>::COLUMNS.join(", ")
        );
        let report = conn
            .query_row(&sql, [beacon_id], LocationReport::from_row)
            .optional()?;
        Ok(report)
    }

    /// Drop fixes older than `cutoff` across all beacons.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn delete_before(&self, cutoff: i64) -> Result<usize> {
        let removed = self.write(|conn| {
            Ok(conn.execute(
                "DELETE FROM LocationReports WHERE timestamp < ?1",
                [cutoff],
            )?)
        })?;
        debug!(removed, cutoff, "Pruned location reports");
        Ok(removed)
    }
}

// ==================
// Daily history fetch ledger
// ==================

impl Entity for DailyHistoryFetchRecord {
    type Key = (BeaconId, NaiveDate);

    const NAME: &'static str = "daily fetch record";
    const TABLE: &'static str = schema::DAILY_HISTORY_FETCH_RECORDS;
    const COLUMNS: &'static [&'static str] = &["beacon_id", "day", "fetched_at"];
    const KEY_COLUMNS: &'static [&'static str] = &["beacon_id", "day"];
    const DELETION: DeletionPolicy = DeletionPolicy::Hard;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            beacon_id: row.get(0)?,
            day: day_column(row, 1)?,
            fetched_at: row.get(2)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            text(self.beacon_id.as_str()),
            Value::Text(format_day(self.day)),
            Value::Integer(self.fetched_at),
        ]
    }

    fn key_values((beacon_id, day): &(BeaconId, NaiveDate)) -> Vec<Value> {
        vec![text(beacon_id.as_str()), Value::Text(format_day(*day))]
    }
}

impl Repository<DailyHistoryFetchRecord> {
    /// Whether the history for `day` was already fetched.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn was_fetched(&self, beacon_id: &BeaconId, day: NaiveDate) -> Result<bool> {
        Ok(self.get_by_id(&(beacon_id.clone(), day))?.is_some())
    }

    /// Record that `day` was fetched. Repeating it only moves `fetched_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn mark_fetched(&self, beacon_id: &BeaconId, day: NaiveDate, now: i64) -> Result<()> {
        self.upsert(&DailyHistoryFetchRecord {
            beacon_id: beacon_id.clone(),
            day,
            fetched_at: now,
        })
    }

    /// Ledger entries for one beacon, oldest day first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_for_beacon(&self, beacon_id: &BeaconId) -> Result<Vec<DailyHistoryFetchRecord>> {
        let conn = self.pool().get()?;
        Self::select(&conn, "beacon_id = ?1", vec![text(beacon_id.as_str())])
    }
}

// ==================
// User beacon options
// ==================

impl Entity for UserBeaconOptions {
    type Key = BeaconId;

    const NAME: &'static str = "beacon options";
    const TABLE: &'static str = schema::USER_BEACON_OPTIONS;
    const COLUMNS: &'static [&'static str] =
        &["beacon_id", "ui_name", "emoji", "hide_from_map", "last_update"];
    const KEY_COLUMNS: &'static [&'static str] = &["beacon_id"];
    const DELETION: DeletionPolicy = DeletionPolicy::Hard;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            beacon_id: row.get(0)?,
            ui_name: row.get(1)?,
            emoji: row.get(2)?,
            hide_from_map: row.get(3)?,
            last_update: row.get(4)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            text(self.beacon_id.as_str()),
            opt_text(self.ui_name.as_deref()),
            opt_text(self.emoji.as_deref()),
            Value::Integer(i64::from(self.hide_from_map)),
            Value::Integer(self.last_update),
        ]
    }

    fn key_values(key: &BeaconId) -> Vec<Value> {
        vec![text(key.as_str())]
    }
}

impl Repository<UserBeaconOptions> {
    /// The customization row for a beacon, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_by_beacon_id(&self, beacon_id: &BeaconId) -> Result<Option<UserBeaconOptions>> {
        self.get_by_id(beacon_id)
    }

    /// The options in effect for a beacon: its row, or the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn options_or_default(&self, beacon_id: &BeaconId) -> Result<UserBeaconOptions> {
        Ok(self
            .get_by_id(beacon_id)?
            .unwrap_or_else(|| UserBeaconOptions::defaults_for(beacon_id.clone())))
    }

    /// Reset a beacon to defaults by removing its row.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn delete_by_beacon_id(&self, beacon_id: &BeaconId) -> Result<bool> {
        Ok(self.delete(beacon_id, 0)? > 0)
    }
}

// ==================
// Google devices
// ==================

impl Entity for GoogleDevice {
    type Key = CanonicId;

    const NAME: &'static str = "device";
    const TABLE: &'static str = schema::GOOGLE_DEVICES;
    const COLUMNS: &'static [&'static str] = &[
        "canonic_id",
        "name",
        "emoji",
        "added_at",
        "last_update",
        "is_removed",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["canonic_id"];
    const DELETION: DeletionPolicy = DeletionPolicy::Soft {
        flag_column: "is_removed",
        stamp_column: "last_update",
    };

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            canonic_id: row.get(0)?,
            name: row.get(1)?,
            emoji: row.get(2)?,
            added_at: row.get(3)?,
            last_update: row.get(4)?,
            is_removed: row.get(5)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            text(self.canonic_id.as_str()),
            opt_text(self.name.as_deref()),
            opt_text(self.emoji.as_deref()),
            Value::Integer(self.added_at),
            Value::Integer(self.last_update),
            Value::Integer(i64::from(self.is_removed)),
        ]
    }

    fn key_values(key: &CanonicId) -> Vec<Value> {
        vec![text(key.as_str())]
    }
}

impl Repository<GoogleDevice> {
    /// Mark a device as no longer reported by the server.
    ///
    /// The row and its history stay; `last_update` moves to `now` even if
    /// the device was already removed. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_removed(&self, canonic_id: &CanonicId, now: i64) -> Result<()> {
        self.delete(canonic_id, now)?;
        Ok(())
    }

    /// Reconcile the table with the devices the server reports right now.
    ///
    /// Reported devices are written as active with `last_update = now`,
    /// keeping the `added_at` (and emoji) of devices already known. Active
    /// devices missing from the listing are soft-removed. Runs as one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any read or write fails; nothing changes then.
    pub fn sync_reported(&self, reported: &[GoogleDevice], now: i64) -> Result<DeviceSyncReport> {
        let report = self.write(|conn| {
            let mut report = DeviceSyncReport::default();
            let mut seen = HashSet::new();
            let mut rows = Vec::with_capacity(reported.len());

            for device in reported {
                if !seen.insert(device.canonic_id.clone()) {
                    continue;
                }
                let mut row = device.clone();
                row.is_removed = false;
                row.last_update = now;

                if let Some(existing) = Self::get_in(conn, &device.canonic_id)? {
                    row.added_at = existing.added_at;
                    if row.emoji.is_none() {
                        row.emoji = existing.emoji;
                    }
                    report.updated.push(device.canonic_id.clone());
                } else {
                    report.added.push(device.canonic_id.clone());
                }
                rows.push(row);
            }
            Self::upsert_in(conn, &rows)?;

            for active in Self::select(conn, "is_removed = 0", Vec::new())? {
                if !seen.contains(&active.canonic_id) {
                    Self::delete_in(conn, &active.canonic_id, now)?;
                    report.removed.push(active.canonic_id);
                }
            }
            Ok(report)
        })?;

        if !report.any() {
            debug!("No devices reported or stored");
            return Ok(report);
        }
        if !report.removed.is_empty() {
            warn!(
                removed = report.removed.len(),
                "Devices no longer reported by the FMD server"
            );
        }
        debug!(
            added = report.added.len(),
            updated = report.updated.len(),
            "Synced reported devices"
        );
        Ok(report)
    }
}
