use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::filter::Filter;
use crate::traits::DataStore;

type Collections = BTreeMap<String, BTreeMap<String, Document>>;

/// Serialized form of a whole store: collection name to its documents.
pub type StoreSnapshot = BTreeMap<String, Vec<Document>>;

/// In-memory, map-based data store.
///
/// Intended for tests, embedding, and the command-line tool. All collections
/// are held behind one `RwLock`, which is what makes `find_or_create`
/// atomic. The lock is never held across an `.await`.
///
/// The store can be switched offline with [`set_available`](Self::set_available)
/// to exercise callers' handling of an unreachable backend.
pub struct InMemoryDataStore {
    collections: RwLock<Collections>,
    available: AtomicBool,
}

impl InMemoryDataStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::from_snapshot(StoreSnapshot::new())
    }

    /// Rebuild a store from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let collections = snapshot
            .into_iter()
            .map(|(name, docs)| {
                let docs = docs.into_iter().map(|d| (d.id.clone(), d)).collect();
                (name, docs)
            })
            .collect();
        Self {
            collections: RwLock::new(collections),
            available: AtomicBool::new(true),
        }
    }

    /// Load a store persisted with [`persist`](Self::persist). A missing
    /// file yields an empty store.
    pub fn load(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no store snapshot; starting empty");
            return Ok(Self::new());
        }
        let bytes = std::fs::read(path)?;
        let snapshot: StoreSnapshot =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
        debug!(path = %path.display(), collections = snapshot.len(), "store snapshot loaded");
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the whole store to `path` atomically (temp file, then rename).
    pub fn persist(&self, path: &Path) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(&self.snapshot()?)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        debug!(path = %path.display(), bytes = bytes.len(), "store snapshot persisted");
        Ok(())
    }

    /// Copy of every collection.
    pub fn snapshot(&self) -> StoreResult<StoreSnapshot> {
        let map = self.read()?;
        Ok(map
            .iter()
            .map(|(name, docs)| (name.clone(), docs.values().cloned().collect()))
            .collect())
    }

    /// Simulate the backend going offline (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|map| map.get(collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    /// Returns `true` if the store holds no documents at all.
    pub fn is_empty(&self) -> bool {
        self.collections
            .read()
            .map(|map| map.values().all(BTreeMap::is_empty))
            .unwrap_or(true)
    }

    /// Names of all collections that have been written to.
    pub fn collection_names(&self) -> Vec<String> {
        self.collections
            .read()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store is offline".into()))
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Collections>> {
        self.check_available()?;
        self.collections
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Collections>> {
        self.check_available()?;
        self.collections
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }
}

impl Default for InMemoryDataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let map = self.read()?;
        Ok(map.get(collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn create(&self, collection: &str, doc: Document) -> StoreResult<Document> {
        let mut map = self.write()?;
        let docs = map.entry(collection.to_string()).or_default();
        if docs.contains_key(&doc.id) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: doc.id,
            });
        }
        docs.insert(doc.id.clone(), doc.clone());
        Ok(doc)
    }

    async fn save(&self, collection: &str, doc: Document) -> StoreResult<Document> {
        let mut map = self.write()?;
        map.entry(collection.to_string())
            .or_default()
            .insert(doc.id.clone(), doc.clone());
        Ok(doc)
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let mut map = self.write()?;
        Ok(map
            .get_mut(collection)
            .map(|docs| docs.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn find_or_create(
        &self,
        collection: &str,
        filter: &Filter,
        initial: Document,
    ) -> StoreResult<(Document, bool)> {
        let mut map = self.write()?;
        let docs = map.entry(collection.to_string()).or_default();
        if let Some(found) = filter.paged(0, 1).apply(docs.values()).into_iter().next() {
            return Ok((found, false));
        }
        if let Some(existing) = docs.get(&initial.id) {
            // The filter missed but the id is taken; the existing row wins.
            return Ok((existing.clone(), false));
        }
        docs.insert(initial.id.clone(), initial.clone());
        Ok((initial, true))
    }

    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let map = self.read()?;
        Ok(map
            .get(collection)
            .map(|docs| filter.apply(docs.values()))
            .unwrap_or_default())
    }
}

impl std::fmt::Debug for InMemoryDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDataStore")
            .field("collections", &self.collection_names())
            .field("available", &self.is_available())
            .finish()
    }
}
