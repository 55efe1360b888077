//! Durable key/value store for mediaserver-mirror
//!
//! Both persistent caches sit on the same mechanism: one SQLite file holding a
//! single `entries` table. Each write is its own committed statement, so an
//! entry is on disk before the call that stored it returns.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`entries`] - Entry CRUD

use sqlx::{FromRow, sqlite::SqlitePool};

mod entries;
mod migrations;

/// Entry record from database
#[derive(Debug, Clone, FromRow)]
pub struct Entry {
    /// Lookup key
    pub key: String,
    /// Stored value (JSON text)
    pub value: String,
    /// Unix timestamp of the last write
    pub updated_at: i64,
}

/// Database handle for one key/value store
pub struct Database {
    pool: SqlitePool,
}
