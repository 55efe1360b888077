//! Completion markers for assembled bundles.

use crate::Result;
use crate::db::Database;
use std::collections::HashSet;
use std::path::Path;
use tokio::sync::Mutex;

const COMPLETE: &str = "true";

/// Durable set of output paths known to be fully written
pub struct CompletionCache {
    db: Database,
    complete: Mutex<HashSet<String>>,
}

impl CompletionCache {
    /// Open the markers stored at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        let db = Database::new(path).await?;
        let complete = db
            .load_all()
            .await?
            .into_iter()
            .filter(|entry| entry.value == COMPLETE)
            .map(|entry| entry.key)
            .collect::<HashSet<_>>();
        tracing::debug!(path = %path.display(), markers = complete.len(), "Completion cache loaded");

        Ok(Self {
            db,
            complete: Mutex::new(complete),
        })
    }

    /// Whether `output` was marked complete
    pub async fn is_complete(&self, output: &Path) -> bool {
        self.complete.lock().await.contains(&marker_key(output))
    }

    /// Record that every write for `output` succeeded
    pub async fn mark_complete(&self, output: &Path) -> Result<()> {
        let key = marker_key(output);
        let mut complete = self.complete.lock().await;
        self.db.put_entry(&key, COMPLETE).await?;
        complete.insert(key);
        Ok(())
    }

    /// Drop the marker for `output`, returning whether one existed
    pub async fn clear(&self, output: &Path) -> Result<bool> {
        let key = marker_key(output);
        let mut complete = self.complete.lock().await;
        self.db.remove_entry(&key).await?;
        Ok(complete.remove(&key))
    }

    /// Number of markers
    pub async fn len(&self) -> usize {
        self.complete.lock().await.len()
    }

    /// Whether no output is marked complete
    pub async fn is_empty(&self) -> bool {
        self.complete.lock().await.is_empty()
    }

    /// Close the underlying store
    pub async fn close(self) {
        self.db.close().await;
    }
}

fn marker_key(output: &Path) -> String {
    output.to_string_lossy().into_owned()
}
