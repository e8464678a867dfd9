//! Generic table repository.
//!
//! Every entity table supports the same contract: list, lookup by key,
//! insert-or-replace, and delete. How a delete behaves is part of the
//! entity definition ([`DeletionPolicy`]) rather than of each repository.
//!
//! Reads check out a pooled connection and see a committed snapshot.
//! Writes run inside one IMMEDIATE transaction, so a concurrent reader sees
//! either the whole batch or none of it.

use crate::error::Result;
use crate::storage::sqlite::DbPool;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use std::marker::PhantomData;
use tracing::debug;

/// What `delete` does for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPolicy {
    /// Remove the row.
    Hard,
    /// Keep the row: set `flag_column` to 1 and stamp `stamp_column`.
    Soft {
        flag_column: &'static str,
        stamp_column: &'static str,
    },
}

/// A value object stored one-per-row in a table.
pub trait Entity: Sized {
    /// Primary key; may be composite.
    type Key;

    /// Human-readable name, for logs and errors.
    const NAME: &'static str;
    const TABLE: &'static str;
    /// All columns, in the order `from_row` reads and `to_values` writes.
    const COLUMNS: &'static [&'static str];
    /// Primary key columns, in the order `key_values` produces.
    const KEY_COLUMNS: &'static [&'static str];
    const DELETION: DeletionPolicy;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
    fn to_values(&self) -> Vec<Value>;
    fn key_values(key: &Self::Key) -> Vec<Value>;
}

/// Typed access to one entity table.
pub struct Repository<E> {
    pool: DbPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    pub(crate) fn new(pool: DbPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// All rows in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_all(&self) -> Result<Vec<E>> {
        let conn = self.pool.get()?;
        Self::select(&conn, "1 = 1", Vec::new())
    }

    /// All rows that are not soft-deleted, in key order.
    ///
    /// For hard-delete entities this is the same as [`get_all`](Self::get_all).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_all_active(&self) -> Result<Vec<E>> {
        let conn = self.pool.get()?;
        match E::DELETION {
            DeletionPolicy::Hard => Self::select(&conn, "1 = 1", Vec::new()),
            DeletionPolicy::Soft { flag_column, .. } => {
                Self::select(&conn, &format!("{flag_column} = 0"), Vec::new())
            }
        }
    }

    /// Look up one row. Soft-deleted rows are still returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails; a missing row is `Ok(None)`.
    pub fn get_by_id(&self, key: &E::Key) -> Result<Option<E>> {
        let conn = self.pool.get()?;
        Self::get_in(&conn, key)
    }

    /// Insert or fully replace one row.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn upsert(&self, entity: &E) -> Result<()> {
        self.upsert_all(std::slice::from_ref(entity))
    }

    /// Insert or fully replace rows, keyed by primary key.
    ///
    /// Last writer wins; nothing from the previous row is merged in. The
    /// whole batch commits together.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is written in that case.
    pub fn upsert_all(&self, entities: &[E]) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }
        self.write(|conn| Self::upsert_in(conn, entities))?;
        debug!(entity = E::NAME, count = entities.len(), "Upserted rows");
        Ok(())
    }

    /// Delete a row according to the entity's [`DeletionPolicy`].
    ///
    /// Soft deletes may be repeated; each call restamps the row with `now`.
    /// Returns the number of rows touched (0 if the key is unknown).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn delete(&self, key: &E::Key, now: i64) -> Result<usize> {
        self.write(|conn| Self::delete_in(conn, key, now))
    }

    /// Number of rows, including soft-deleted ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count(&self) -> Result<usize> {
        let conn = self.pool.get()?;
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", E::TABLE), [], |row| {
            row.get(0)
        })?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    // ── Transaction-scoped building blocks ────────────────────

    /// Run `f` inside an IMMEDIATE transaction on a pooled connection.
    pub(crate) fn write<R>(&self, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Select rows matching a `WHERE` fragment, in key order.
    pub(crate) fn select(conn: &Connection, filter: &str, params: Vec<Value>) -> Result<Vec<E>> {
        Self::select_ordered(conn, filter, &E::KEY_COLUMNS.join(", "), params)
    }

    /// Select rows matching a `WHERE` fragment with an explicit ordering.
    pub(crate) fn select_ordered(
        conn: &Connection,
        filter: &str,
        order_by: &str,
        params: Vec<Value>,
    ) -> Result<Vec<E>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {filter} ORDER BY {order_by}",
            E::COLUMNS.join(", "),
            E::TABLE,
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), E::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub(crate) fn get_in(conn: &Connection, key: &E::Key) -> Result<Option<E>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            E::COLUMNS.join(", "),
            E::TABLE,
            key_clause::<E>(1),
        );
        let row = conn
            .query_row(&sql, params_from_iter(E::key_values(key)), E::from_row)
            .optional()?;
        Ok(row)
    }

    pub(crate) fn upsert_in(conn: &Connection, entities: &[E]) -> Result<()> {
        let placeholders = (1..=E::COLUMNS.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({placeholders})",
            E::TABLE,
            E::COLUMNS.join(", "),
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        for entity in entities {
            stmt.execute(params_from_iter(entity.to_values()))?;
        }
        Ok(())
    }

    pub(crate) fn delete_in(conn: &Connection, key: &E::Key, now: i64) -> Result<usize> {
        let mut params = E::key_values(key);
        let changed = match E::DELETION {
            DeletionPolicy::Hard => conn.execute(
                &format!("DELETE FROM {} WHERE {}", E::TABLE, key_clause::<E>(1)),
                params_from_iter(params),
            )?,
            DeletionPolicy::Soft {
                flag_column,
                stamp_column,
            } => {
                params.insert(0, Value::Integer(now));
                conn.execute(
                    &format!(
                        "UPDATE {} SET {flag_column} = 1, {stamp_column} = ?1 WHERE {}",
                        E::TABLE,
                        key_clause::<E>(2),
                    ),
                    params_from_iter(params),
                )?
            }
        };
        debug!(entity = E::NAME, changed, policy = ?E::DELETION, "Deleted");
        Ok(changed)
    }
}

/// `a = ?n AND b = ?n+1 ...` over the key columns, numbering from `first`.
fn key_clause<E: Entity>(first: usize) -> String {
    E::KEY_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{col} = ?{}", first + i))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Convert an optional text value for binding.
pub(crate) fn opt_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |s| Value::Text(s.to_string()))
}

/// Convert an optional integer value for binding.
pub(crate) fn opt_int(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}
