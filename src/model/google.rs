//! Google Find My Device trackers.
//!
//! These are NOT Apple beacons and carry no property-list payload. Rows are
//! never physically deleted: a device that stops being reported by the FMD
//! server is flagged `is_removed` so its history survives.

use crate::model::ids::CanonicId;
use serde::{Deserialize, Serialize};

/// Emoji stored for devices, since the FMD server does not provide one.
pub const DEFAULT_DEVICE_EMOJI: &str = "📍";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleDevice {
    pub canonic_id: CanonicId,
    pub name: Option<String>,
    pub emoji: Option<String>,

    /// First time the device was seen (Unix milliseconds)
    pub added_at: i64,

    /// Last change to this row, including removal (Unix milliseconds)
    pub last_update: i64,

    pub is_removed: bool,
}

impl GoogleDevice {
    /// A newly reported, active device with the default emoji.
    pub fn new(canonic_id: impl Into<CanonicId>, name: Option<String>, now: i64) -> Self {
        Self {
            canonic_id: canonic_id.into(),
            name,
            emoji: Some(DEFAULT_DEVICE_EMOJI.to_string()),
            added_at: now,
            last_update: now,
            is_removed: false,
        }
    }
}

/// Outcome of reconciling the stored devices against a server listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSyncReport {
    /// Devices seen for the first time.
    pub added: Vec<CanonicId>,
    /// Known devices that were reported again (including revived ones).
    pub updated: Vec<CanonicId>,
    /// Active devices that the server no longer reports.
    pub removed: Vec<CanonicId>,
}

impl DeviceSyncReport {
    /// Returns true if the sync changed anything.
    #[must_use]
    pub fn any(&self) -> bool {
        !(self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty())
    }
}
