//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Inspect and maintain the tracker store
#[derive(Parser, Debug)]
#[command(name = "tagstore", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: platform data dir, tagstore.db)
    #[arg(long, global = true, env = "TAGSTORE_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print version information
    Version,

    /// Show store location, schema version and row counts
    Status,

    /// Create the store or bring its schema up to date
    Migrate,

    /// Google Find My Device trackers
    Devices {
        #[command(subcommand)]
        command: DeviceCommands,
    },

    /// Apple offline-finding beacons
    Beacons {
        #[command(subcommand)]
        command: BeaconCommands,
    },

    /// Per-beacon display options
    Options {
        #[command(subcommand)]
        command: OptionsCommands,
    },

    /// User settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
}

// ============================================================================
// Device Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum DeviceCommands {
    /// List devices
    List {
        /// Include devices no longer reported by the server
        #[arg(long)]
        all: bool,
    },

    /// Mark a device as removed (its history is kept)
    Remove {
        /// Canonic ID of the device
        canonic_id: String,
    },
}

// ============================================================================
// Beacon Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum BeaconCommands {
    /// List owned beacons
    List,

    /// List beacon ids referenced by history but no longer owned
    Orphans,

    /// Delete an owned beacon and its options (history is kept)
    Forget {
        /// Beacon ID
        id: String,
    },
}

// ============================================================================
// Options Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum OptionsCommands {
    /// Show the options in effect for a beacon
    Show {
        /// Beacon ID
        beacon_id: String,
    },

    /// Reset a beacon's options to defaults
    Reset {
        /// Beacon ID
        beacon_id: String,
    },
}

// ============================================================================
// Settings Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show all settings (password masked)
    Show,

    /// Set one setting
    Set {
        /// Setting key (e.g. fmd_server_url, dark-theme)
        key: String,

        /// New value
        value: String,
    },

    /// Clear one setting
    Unset {
        /// Setting key
        key: String,
    },
}
