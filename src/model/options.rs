//! Per-beacon user preferences.

use crate::model::ids::BeaconId;
use serde::{Deserialize, Serialize};

/// User customization for one beacon.
///
/// A row exists only once the user customized the beacon; absence means
/// defaults. Updates replace the whole row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBeaconOptions {
    pub beacon_id: BeaconId,

    /// Name shown instead of the imported one
    pub ui_name: Option<String>,

    /// Custom icon
    pub emoji: Option<String>,

    pub hide_from_map: bool,

    /// Last change (Unix milliseconds)
    pub last_update: i64,
}

impl UserBeaconOptions {
    /// The options that apply when no row exists.
    #[must_use]
    pub fn defaults_for(beacon_id: BeaconId) -> Self {
        Self {
            beacon_id,
            ui_name: None,
            emoji: None,
            hide_from_map: false,
            last_update: 0,
        }
    }
}
