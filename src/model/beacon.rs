//! Apple-ecosystem models: imports, owned beacons and their naming records.
//!
//! Owned beacons are created by an import of a property-list bundle. The
//! bundle is parsed by an external collaborator; this crate only stores the
//! resulting values.

use crate::model::ids::{BeaconId, ImportId, NamingRecordId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Import status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl ImportStatus {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse from the stored string. Unknown values read as pending.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// A raw import operation that produced owned beacons and naming records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub id: ImportId,

    /// Where the bundle came from (file name, share intent URI, ...)
    pub source_ref: String,

    /// SHA-256 of the raw payload, used to spot repeated imports
    pub content_hash: Option<String>,

    /// Import timestamp (Unix milliseconds)
    pub imported_at: i64,

    pub status: ImportStatus,
}

impl Import {
    /// Create a pending import record for a raw payload.
    #[must_use]
    pub fn from_payload(source_ref: impl Into<String>, payload: &[u8], now: i64) -> Self {
        Self {
            id: ImportId::generate(),
            source_ref: source_ref.into(),
            content_hash: Some(payload_hash(payload)),
            imported_at: now,
            status: ImportStatus::Pending,
        }
    }
}

/// Hex-encoded SHA-256 of an import payload.
#[must_use]
pub fn payload_hash(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    format!("{:x}", hasher.finalize())
}

/// An Apple offline-finding beacon owned by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedBeacon {
    pub id: BeaconId,

    /// Import that produced this beacon, if known
    pub import_id: Option<ImportId>,

    /// Display name
    pub name: Option<String>,

    /// Imported key material (opaque to this crate)
    pub key_material: String,

    /// Import timestamp (Unix milliseconds)
    pub imported_at: i64,
}

/// A user-assigned or imported display label for an owned beacon.
///
/// Many records may point at one beacon; the newest one wins for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconNamingRecord {
    pub id: NamingRecordId,
    pub beacon_id: BeaconId,
    pub import_id: Option<ImportId>,
    pub name: String,
    pub emoji: Option<String>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

/// Everything one import writes, stored atomically by
/// [`Database::record_import`](crate::storage::Database::record_import).
#[derive(Debug, Clone)]
pub struct ImportBundle {
    pub import: Import,
    pub beacons: Vec<OwnedBeacon>,
    pub naming_records: Vec<BeaconNamingRecord>,
}

impl ImportBundle {
    #[must_use]
    pub fn new(import: Import) -> Self {
        Self {
            import,
            beacons: Vec::new(),
            naming_records: Vec::new(),
        }
    }

    /// Add a beacon, linking it to this bundle's import.
    #[must_use]
    pub fn with_beacon(mut self, mut beacon: OwnedBeacon) -> Self {
        beacon.import_id = Some(self.import.id.clone());
        self.beacons.push(beacon);
        self
    }

    /// Add a naming record, linking it to this bundle's import.
    #[must_use]
    pub fn with_naming_record(mut self, mut record: BeaconNamingRecord) -> Self {
        record.import_id = Some(self.import.id.clone());
        self.naming_records.push(record);
        self
    }
}
