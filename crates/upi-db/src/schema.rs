//! Embedded table definition for the `upi` table.
//!
//! The DDL is compiled into the binary and applied with `IF NOT EXISTS`, so
//! running it on every startup is a no-op once the table is present.

use rusqlite::Connection;
use thiserror::Error;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Errors that can occur while bootstrapping the schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The DDL batch failed to execute.
    #[error("schema initialization failed: {0}")]
    ExecutionFailed(#[from] rusqlite::Error),
}

/// Creates the `upi` table if it does not exist.
///
/// # Errors
///
/// Returns `SchemaError::ExecutionFailed` if the DDL cannot be applied.
pub fn init_schema(conn: &Connection) -> Result<(), SchemaError> {
    tracing::info!("ensuring upi table exists");
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
