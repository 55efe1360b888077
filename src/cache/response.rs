//! Response cache keyed by request identity.

use crate::Result;
use crate::db::Database;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Durable request-key → payload map
pub struct ResponseCache {
    db: Database,
    entries: Mutex<HashMap<String, Value>>,
    force_reload: AtomicBool,
}

impl ResponseCache {
    /// Open the cache stored at `path`, loading every entry into memory
    ///
    /// With `force_reload` set, no lookup is ever served from the cache for the
    /// lifetime of this instance; fetched payloads are still stored.
    pub async fn open(path: &Path, force_reload: bool) -> Result<Self> {
        let db = Database::new(path).await?;

        let mut entries = HashMap::new();
        for entry in db.load_all().await? {
            match serde_json::from_str::<Value>(&entry.value) {
                Ok(value) => {
                    entries.insert(entry.key, value);
                }
                Err(e) => {
                    tracing::warn!(key = %entry.key, error = %e, "Dropping unreadable cached response");
                }
            }
        }
        tracing::debug!(path = %path.display(), entries = entries.len(), "Response cache loaded");

        Ok(Self {
            db,
            entries: Mutex::new(entries),
            force_reload: AtomicBool::new(force_reload),
        })
    }

    /// Return the cached payload for `key`, or fetch, store and return it
    ///
    /// `fetch` runs when the key is absent, when `force_new` is set, or when the
    /// cache is in force-reload mode. The fetched payload is durably stored
    /// before this returns.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, force_new: bool, fetch: F) -> Result<Value>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if !force_new && !self.force_reload.load(Ordering::Relaxed) {
            if let Some(value) = self.entries.lock().await.get(key) {
                tracing::trace!(key, "Response cache hit");
                return Ok(value.clone());
            }
        }

        tracing::debug!(key, force_new, "Fetching");
        let value = fetch(key.to_string()).await?;
        self.store(key, &value).await?;
        Ok(value)
    }

    /// Store a payload under `key`, replacing any previous one
    pub async fn store(&self, key: &str, value: &Value) -> Result<()> {
        let serialized = serde_json::to_string(value)?;
        let mut entries = self.entries.lock().await;
        self.db.put_entry(key, &serialized).await?;
        entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    /// Cached payload for `key`, ignoring force-reload mode
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().await.get(key).cloned()
    }

    /// Forget `key` so the next lookup fetches it again
    pub async fn invalidate(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let removed = self.db.remove_entry(key).await?;
        entries.remove(key);
        Ok(removed)
    }

    /// Enable or disable force-reload mode
    pub fn set_force_reload(&self, enabled: bool) {
        self.force_reload.store(enabled, Ordering::Relaxed);
    }

    /// Whether force-reload mode is on
    pub fn force_reload(&self) -> bool {
        self.force_reload.load(Ordering::Relaxed)
    }

    /// Number of cached responses
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the cache holds no responses
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Close the underlying store
    pub async fn close(self) {
        self.db.close().await;
    }
}
