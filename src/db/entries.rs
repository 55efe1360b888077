//! Entry CRUD for the key/value store.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{Database, Entry};

impl Database {
    /// Load every entry, oldest write first
    pub async fn load_all(&self) -> Result<Vec<Entry>> {
        let rows = sqlx::query_as::<_, Entry>(
            r#"
            SELECT key, value, updated_at FROM entries ORDER BY updated_at ASC, key ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to load entries: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Get one entry by key
    pub async fn get_entry(&self, key: &str) -> Result<Option<Entry>> {
        let row = sqlx::query_as::<_, Entry>(
            r#"
            SELECT key, value, updated_at FROM entries WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get entry: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Insert or overwrite an entry
    pub async fn put_entry(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO entries (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to store entry: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Remove an entry, returning whether it existed
    pub async fn remove_entry(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to remove entry: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of stored entries
    pub async fn count_entries(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count entries: {}",
                    e
                )))
            })?;

        Ok(count)
    }
}
