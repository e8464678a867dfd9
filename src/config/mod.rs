//! Configuration management.
//!
//! Resolves where the store lives and how it is opened. There is one
//! database per installation; the CLI and any embedding application share
//! it through [`resolve_db_path`].

use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the store inside the data directory.
pub const DB_FILE_NAME: &str = "tagstore.db";

/// Default number of pooled connections for file-backed stores.
pub const DEFAULT_POOL_SIZE: u32 = 8;

/// Default time a connection waits on a locked database.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the store is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    /// Private in-memory store, gone when the last handle drops.
    Memory,
}

/// How to open the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub location: Location,
    /// Maximum pooled connections. Ignored for in-memory stores, which
    /// always use a single connection.
    pub pool_size: u32,
    pub busy_timeout: Duration,
}

impl StoreConfig {
    /// File-backed store with default tuning.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
            pool_size: DEFAULT_POOL_SIZE,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// In-memory store, mostly for tests.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            location: Location::Memory,
            pool_size: 1,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// Path of the database file, if file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }
}

/// Platform data directory for the store.
///
/// `~/.local/share/tagstore` on Linux, the equivalent elsewhere.
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "tagstore", "tagstore")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Check if test mode is enabled.
///
/// Test mode is enabled by setting `TAGSTORE_TEST_DB=1` (or any non-empty
/// value other than `0`/`false`). It redirects the store to an isolated
/// test database.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("TAGSTORE_TEST_DB").is_ok_and(|v| is_truthy(&v))
}

fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Get the test database path: `<data dir>/test/tagstore.db`.
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("test").join(DB_FILE_NAME))
}

/// Resolve the database path.
///
/// Priority:
/// 1. `explicit_path` (the CLI's `--db`, which also reads `TAGSTORE_DB`)
/// 2. `TAGSTORE_TEST_DB` → the isolated test database
/// 3. `<data dir>/tagstore.db`
///
/// Returns `None` only if no home directory can be determined.
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if is_test_mode() {
        return test_db_path();
    }

    data_dir().map(|dir| dir.join(DB_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let path = Path::new("/tmp/elsewhere/store.db");
        assert_eq!(resolve_db_path(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn test_truthy_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy("yes"));
        assert!(!is_truthy(""));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("FALSE"));
    }

    #[test]
    fn test_store_config_defaults() {
        let file = StoreConfig::file("/tmp/x.db");
        assert_eq!(file.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(file.busy_timeout, DEFAULT_BUSY_TIMEOUT);
        assert_eq!(file.path(), Some(Path::new("/tmp/x.db")));

        let memory = StoreConfig::memory().with_pool_size(4);
        assert_eq!(memory.location, Location::Memory);
        assert!(memory.path().is_none());
        assert_eq!(StoreConfig::file("a").with_pool_size(0).pool_size, 1);
    }
}
