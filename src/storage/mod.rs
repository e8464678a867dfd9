//! SQLite storage layer.
//!
//! This module provides the persistence layer using SQLite with:
//! - Versioned, transactional migrations
//! - One generic repository per entity table
//! - WAL mode and a connection pool for concurrent reads
//! - IMMEDIATE transactions for every write
//!
//! # Submodules
//!
//! - [`schema`] - Table registry and connection pragmas
//! - [`migrations`] - Embedded migrations and the version marker
//! - [`repository`] - Generic repository and deletion policy
//! - [`entities`] - Table mappings and per-entity queries
//! - [`settings`] - User settings store
//! - [`sqlite`] - Store lifecycle

pub mod entities;
pub mod migrations;
pub mod repository;
pub mod schema;
pub mod settings;
pub mod sqlite;

pub use migrations::MigrationReport;
pub use repository::{DeletionPolicy, Entity, Repository};
pub use settings::SettingsStore;
pub use sqlite::{Database, DatabaseHandle, DbPool, TableCount};
