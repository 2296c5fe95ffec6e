use std::sync::Arc;

use cl_store::{DataStore, Document};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SyncResult;

pub const DEFAULT_WATERMARK_COLLECTION: &str = "Replication-Watermark";

/// How far a (source, target, model) replication has progressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watermark {
    /// Source changes at or below this checkpoint have been transferred.
    pub source_since: u64,
    /// Target changes below this checkpoint are already known to the source
    /// side and take no part in conflict detection.
    pub target_since: u64,
}

/// Persists watermarks in a [`DataStore`] collection, one row per pair.
#[derive(Clone)]
pub struct WatermarkStore {
    store: Arc<dyn DataStore>,
    collection: String,
}

impl WatermarkStore {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self::with_collection(store, DEFAULT_WATERMARK_COLLECTION)
    }

    pub fn with_collection(store: Arc<dyn DataStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub fn key(source: &str, target: &str, model: &str) -> String {
        format!("{source}->{target}:{model}")
    }

    /// The stored watermark, or the zero watermark for a new pair.
    pub async fn get(&self, source: &str, target: &str, model: &str) -> SyncResult<Watermark> {
        let key = Self::key(source, target, model);
        match self.store.find_by_id(&self.collection, &key).await? {
            Some(doc) => Ok(doc.decode()?),
            None => Ok(Watermark::default()),
        }
    }

    pub async fn put(
        &self,
        source: &str,
        target: &str,
        model: &str,
        watermark: Watermark,
    ) -> SyncResult<()> {
        let key = Self::key(source, target, model);
        debug!(%key, source_since = watermark.source_since, target_since = watermark.target_since, "storing watermark");
        self.store
            .save(&self.collection, Document::with_id(key, &watermark)?)
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for WatermarkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkStore")
            .field("collection", &self.collection)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl_store::InMemoryDataStore;

    #[tokio::test]
    async fn missing_watermark_is_zero() {
        let marks = WatermarkStore::new(Arc::new(InMemoryDataStore::new()));
        assert_eq!(marks.get("a", "b", "Note").await.unwrap(), Watermark::default());
    }

    #[tokio::test]
    async fn put_then_get_per_pair() {
        let store = Arc::new(InMemoryDataStore::new());
        let marks = WatermarkStore::new(store.clone());
        let mark = Watermark {
            source_since: 4,
            target_since: 2,
        };
        marks.put("a", "b", "Note", mark).await.unwrap();
        assert_eq!(marks.get("a", "b", "Note").await.unwrap(), mark);
        assert_eq!(marks.get("b", "a", "Note").await.unwrap(), Watermark::default());
        assert_eq!(store.len(DEFAULT_WATERMARK_COLLECTION), 1);
    }
}
