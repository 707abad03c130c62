//! Connection provider for the UPI registry.
//!
//! Hands out one SQLite connection per call from an `r2d2` pool and owns the
//! `upi` table definition. A pooled connection is returned when its guard is
//! dropped, so every caller releases its connection on every exit path.

mod pool;
mod schema;

pub use pool::{create_pool, DbCredentials, DbPool, DbRuntimeSettings, PoolError};
pub use schema::{init_schema, SchemaError};
