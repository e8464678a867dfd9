//! tagstore - persistence core for a tracker-monitoring app
//!
//! Stores Apple offline-finding beacons and Google Find My Device trackers
//! side by side in one embedded SQLite database, together with their
//! location history and the user's settings.
//!
//! # Architecture
//!
//! - [`model`] - Value objects (beacons, devices, reports, settings)
//! - [`storage`] - SQLite database layer, migrations and repositories
//! - [`config`] - Store location and open options
//! - [`cli`] - Maintenance command-line interface using clap
//! - [`validate`] - Setting name and server URL validation
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod storage;
pub mod validate;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use storage::{Database, DatabaseHandle};
