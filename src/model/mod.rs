//! Data models for the tracker store.
//!
//! Plain value objects handed in by fetch/import collaborators and handed
//! back to the UI. The two device ecosystems are kept apart:
//! - Apple: Import, OwnedBeacon, BeaconNamingRecord, LocationReport,
//!   DailyHistoryFetchRecord, UserBeaconOptions
//! - Google: GoogleDevice
//!
//! UserSettings is a singleton configuration object, not a table row.

pub mod beacon;
pub mod google;
pub mod ids;
pub mod location;
pub mod options;
pub mod settings;
pub mod time;

pub use beacon::{BeaconNamingRecord, Import, ImportBundle, ImportStatus, OwnedBeacon};
pub use google::{DeviceSyncReport, GoogleDevice, DEFAULT_DEVICE_EMOJI};
pub use ids::{BeaconId, CanonicId, ImportId, NamingRecordId};
pub use location::{DailyHistoryFetchRecord, LocationReport};
pub use options::UserBeaconOptions;
pub use settings::{FmdAccount, SettingKey, UserSettings};
