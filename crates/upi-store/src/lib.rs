//! Record store for UPI entries.
//!
//! Every operation acquires its own pooled connection, runs exactly one
//! statement against the `upi` table and releases the connection when the
//! guard drops. SQLite's autocommit makes each write durable on return.
//!
//! The store does no validation: callers are trusted to pass well-formed
//! names and identifiers. Update and delete do not check whether the target
//! row exists; zero rows affected is reported as success.

use rusqlite::{params, Connection, Row};
use serde::Serialize;
use thiserror::Error;
use upi_db::DbPool;

/// A failure during a store operation.
///
/// Both sources surface the driver's message unchanged through `Display`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A connection could not be acquired from the pool.
    #[error(transparent)]
    Pool(#[from] r2d2::Error),
    /// The statement failed to prepare or execute.
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

/// A stored UPI entry.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UpiRecord {
    /// Store-assigned row ID.
    pub id: i64,
    /// Display name of the holder.
    pub name: String,
    /// The UPI identifier string.
    pub upi_id: String,
}

/// Inserts a new row and returns the assigned ID.
pub fn insert_upi(conn: &Connection, name: &str, upi_id: &str) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO upi (name, upi_id) VALUES (?1, ?2)",
        params![name, upi_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Returns every row in storage order.
pub fn select_all_upi(conn: &Connection) -> Result<Vec<UpiRecord>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT id, name, upi_id FROM upi")?;
    let rows = stmt.query_map([], map_row_to_upi)?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

/// Overwrites both fields of the row with `id`. Returns the affected row count.
pub fn update_upi(
    conn: &Connection,
    id: i64,
    name: &str,
    upi_id: &str,
) -> Result<usize, rusqlite::Error> {
    conn.execute(
        "UPDATE upi SET name = ?1, upi_id = ?2 WHERE id = ?3",
        params![name, upi_id, id],
    )
}

/// Deletes the row with `id`. Returns the affected row count.
pub fn delete_upi(conn: &Connection, id: i64) -> Result<usize, rusqlite::Error> {
    conn.execute("DELETE FROM upi WHERE id = ?1", [id])
}

/// Logs a failed operation before handing the result back.
fn logged<T>(operation: &'static str, result: Result<T, StoreError>) -> Result<T, StoreError> {
    if let Err(e) = &result {
        tracing::error!(operation, error = %e, "upi store operation failed");
    }
    result
}

fn map_row_to_upi(row: &Row) -> rusqlite::Result<UpiRecord> {
    Ok(UpiRecord {
        id: row.get("id")?,
        name: row.get("name")?,
        upi_id: row.get("upi_id")?,
    })
}

/// Pool-backed handle exposing the four store operations.
#[derive(Clone)]
pub struct UpiStore {
    pool: DbPool,
}

impl UpiStore {
    /// Wraps an existing connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Inserts a new record.
    ///
    /// Every operation logs its failures before returning them.
    pub fn create(&self, name: &str, upi_id: &str) -> Result<(), StoreError> {
        let id = logged("create", self.create_inner(name, upi_id))?;
        tracing::debug!(id, "created upi record");
        Ok(())
    }

    fn create_inner(&self, name: &str, upi_id: &str) -> Result<i64, StoreError> {
        let conn = self.pool.get()?;
        Ok(insert_upi(&conn, name, upi_id)?)
    }

    /// Returns every record. Ordering is not guaranteed.
    pub fn list_all(&self) -> Result<Vec<UpiRecord>, StoreError> {
        logged("list_all", self.list_inner())
    }

    fn list_inner(&self) -> Result<Vec<UpiRecord>, StoreError> {
        let conn = self.pool.get()?;
        Ok(select_all_upi(&conn)?)
    }

    /// Replaces the name and identifier of the record with `id`.
    ///
    /// A missing `id` is not an error.
    pub fn update(&self, id: i64, name: &str, upi_id: &str) -> Result<(), StoreError> {
        let affected = logged("update", self.update_inner(id, name, upi_id))?;
        if affected == 0 {
            tracing::debug!(id, "update matched no rows");
        }
        Ok(())
    }

    fn update_inner(&self, id: i64, name: &str, upi_id: &str) -> Result<usize, StoreError> {
        let conn = self.pool.get()?;
        Ok(update_upi(&conn, id, name, upi_id)?)
    }

    /// Deletes the record with `id`.
    ///
    /// A missing `id` is not an error.
    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        let affected = logged("delete", self.delete_inner(id))?;
        if affected == 0 {
            tracing::debug!(id, "delete matched no rows");
        }
        Ok(())
    }

    fn delete_inner(&self, id: i64) -> Result<usize, StoreError> {
        let conn = self.pool.get()?;
        Ok(delete_upi(&conn, id)?)
    }
}
