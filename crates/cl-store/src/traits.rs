use async_trait::async_trait;

use crate::document::Document;
use crate::error::StoreResult;
use crate::filter::Filter;

/// Persistence collaborator consumed by the change-tracking core.
///
/// Documents live in named collections and are keyed by their string id.
/// Implementations must satisfy these invariants:
/// - `find_or_create` is atomic: concurrent callers with the same filter
///   observe a single created document.
/// - `create` never overwrites; a present id yields `AlreadyExists`.
/// - All backend failures are propagated, never silently ignored. A backend
///   that cannot be reached reports `StoreError::Unavailable`.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Read a document by id. Returns `Ok(None)` if it does not exist.
    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Insert a new document.
    async fn create(&self, collection: &str, doc: Document) -> StoreResult<Document>;

    /// Insert or replace a document.
    async fn save(&self, collection: &str, doc: Document) -> StoreResult<Document>;

    /// Delete a document by id. Returns `true` if it existed.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    /// Return the first document matching `filter`, or insert `initial`.
    ///
    /// The boolean is `true` when `initial` was inserted.
    async fn find_or_create(
        &self,
        collection: &str,
        filter: &Filter,
        initial: Document,
    ) -> StoreResult<(Document, bool)>;

    /// All documents matching `filter`, ordered and paged as it specifies.
    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>>;

    /// Number of documents matching `filter`, ignoring its paging window.
    ///
    /// Default implementation runs an unpaged `find`. Backends may override
    /// for better performance.
    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        let unpaged = Filter {
            skip: 0,
            limit: None,
            ..filter.clone()
        };
        Ok(self.find(collection, &unpaged).await?.len())
    }
}
