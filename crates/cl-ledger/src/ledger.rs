use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;

use cl_crypto::RevisionHasher;
use cl_store::{DataStore, Direction, Document, Filter};
use cl_types::{Change, ChangeId, Checkpoint, Revision};
use tracing::{debug, info};

use crate::checkpoint::CheckpointSequencer;
use crate::error::{LedgerError, LedgerResult};
use crate::locks::KeyedLocks;
use crate::model::{RecordState, TrackedModel};
use crate::rectify::RectifyEngine;

/// Result of applying a replicated write through
/// [`ChangeLedger::apply_if_unchanged`].
#[derive(Clone, Debug, PartialEq)]
pub enum ApplyOutcome {
    /// The write went through; carries the rectified local change.
    Applied(Change),
    /// The record moved on since the sender saw it; nothing was written.
    Stale(Change),
}

/// Change entries for every tracked record type of one store.
///
/// Owns the store handle, the store's [`CheckpointSequencer`], and the
/// registry of tracked models. Rectification of a given record is
/// serialized through a per-record lock; different records proceed
/// concurrently.
pub struct ChangeLedger {
    store: Arc<dyn DataStore>,
    sequencer: CheckpointSequencer,
    models: HashMap<String, TrackedModel>,
    locks: KeyedLocks,
}

impl ChangeLedger {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        let sequencer = CheckpointSequencer::with_default_collection(Arc::clone(&store));
        Self::with_sequencer(store, sequencer)
    }

    pub fn with_sequencer(store: Arc<dyn DataStore>, sequencer: CheckpointSequencer) -> Self {
        Self {
            store,
            sequencer,
            models: HashMap::new(),
            locks: KeyedLocks::new(),
        }
    }

    pub fn track(mut self, model: TrackedModel) -> Self {
        self.register(model);
        self
    }

    pub fn register(&mut self, model: TrackedModel) {
        debug!(model = %model.name, extra = ?model.extra_fields, "tracking model");
        self.models.insert(model.name.clone(), model);
    }

    pub fn model(&self, name: &str) -> LedgerResult<&TrackedModel> {
        self.models
            .get(name)
            .ok_or_else(|| LedgerError::RequiredModelMissing(name.to_string()))
    }

    pub fn is_tracked(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn models(&self) -> impl Iterator<Item = &TrackedModel> {
        self.models.values()
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    pub fn sequencer(&self) -> &CheckpointSequencer {
        &self.sequencer
    }

    pub fn engine(&self) -> RectifyEngine<'_> {
        RectifyEngine::new(self)
    }

    // -- records --

    pub async fn record_state(&self, model: &str, id: &str) -> LedgerResult<RecordState> {
        let Some(tracked) = self.models.get(model) else {
            return Ok(RecordState::NotTracked);
        };
        Ok(
            match self.store.find_by_id(tracked.data_collection(), id).await? {
                Some(doc) => RecordState::Found(doc),
                None => RecordState::Deleted,
            },
        )
    }

    pub async fn find_record(&self, model: &str, id: &str) -> LedgerResult<Option<Document>> {
        let tracked = self.model(model)?;
        Ok(self.store.find_by_id(tracked.data_collection(), id).await?)
    }

    /// Revision of a record's persisted fields. The id is not part of the
    /// hashed data.
    pub fn revision_for_record(doc: &Document) -> Revision {
        RevisionHasher::REVISION.hash_fields(&doc.fields)
    }

    /// Write a record and rectify its change.
    pub async fn save_record(&self, model: &str, doc: Document) -> LedgerResult<Change> {
        let tracked = self.model(model)?;
        let _guard = self.locks.lock(&record_key(model, &doc.id)).await;
        let id = doc.id.clone();
        self.store.save(tracked.data_collection(), doc).await?;
        self.rectify_locked(model, &id).await
    }

    /// Remove a record and rectify its change to a tombstone.
    pub async fn delete_record(&self, model: &str, id: &str) -> LedgerResult<Change> {
        let tracked = self.model(model)?;
        let _guard = self.locks.lock(&record_key(model, id)).await;
        self.store.delete(tracked.data_collection(), id).await?;
        self.rectify_locked(model, id).await
    }

    /// Write (or delete, when `data` is `None`) a record only if its current
    /// revision is one of `expected`, then rectify.
    ///
    /// Used by replication targets: the check and the write happen under the
    /// record's lock, so a local edit racing the replicated one shows up as
    /// [`ApplyOutcome::Stale`] rather than being overwritten.
    pub async fn apply_if_unchanged(
        &self,
        model: &str,
        id: &str,
        expected: &[Option<Revision>],
        data: Option<Document>,
    ) -> LedgerResult<ApplyOutcome> {
        let tracked = self.model(model)?;
        let _guard = self.locks.lock(&record_key(model, id)).await;
        let current = self
            .find_record(model, id)
            .await?
            .map(|doc| Self::revision_for_record(&doc));
        if !expected.contains(&current) {
            debug!(model, id, "replicated write is stale");
            return Ok(ApplyOutcome::Stale(self.rectify_locked(model, id).await?));
        }
        match data {
            Some(doc) => {
                self.store.save(tracked.data_collection(), doc).await?;
            }
            None => {
                self.store.delete(tracked.data_collection(), id).await?;
            }
        }
        Ok(ApplyOutcome::Applied(self.rectify_locked(model, id).await?))
    }

    // -- changes --

    /// The change entry for a record, creating an untouched one at the
    /// current checkpoint if none exists.
    pub async fn find_or_create_change(&self, model: &str, id: &str) -> LedgerResult<Change> {
        let tracked = self.model(model)?;
        let collection = tracked.change_collection();
        let change_id = ChangeId::for_model(model, id);
        if let Some(doc) = self.store.find_by_id(&collection, change_id.as_str()).await? {
            return Ok(doc.decode()?);
        }
        let initial = Change::new(model, id, self.sequencer.current().await?);
        let (doc, created) = self
            .store
            .find_or_create(
                &collection,
                &Filter::new().eq("id", change_id.as_str()),
                Document::from_serializable(&initial)?,
            )
            .await?;
        if created {
            debug!(model, id, checkpoint = initial.checkpoint, "created change");
        }
        Ok(doc.decode()?)
    }

    pub async fn find_last_change(&self, model: &str, id: &str) -> LedgerResult<Option<Change>> {
        let tracked = self.model(model)?;
        let change_id = ChangeId::for_model(model, id);
        match self
            .store
            .find_by_id(&tracked.change_collection(), change_id.as_str())
            .await?
        {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Rewrite a change's `prev` and stamp it with the current checkpoint so
    /// the next replication pass picks it up again.
    pub async fn update_last_change(
        &self,
        model: &str,
        id: &str,
        prev: Option<Revision>,
    ) -> LedgerResult<Change> {
        let tracked = self.model(model)?;
        let _guard = self.locks.lock(&record_key(model, id)).await;
        let mut change = self.find_or_create_change(model, id).await?;
        change.prev = prev;
        change.checkpoint = change.checkpoint.max(self.sequencer.current().await?);
        self.store
            .save(&tracked.change_collection(), Document::from_serializable(&change)?)
            .await?;
        debug!(model, id, checkpoint = change.checkpoint, "updated last change");
        Ok(change)
    }

    /// Find or create the record's change, then rectify it.
    pub async fn rectify(&self, model: &str, id: &str) -> LedgerResult<Change> {
        self.model(model)?;
        let _guard = self.locks.lock(&record_key(model, id)).await;
        self.rectify_locked(model, id).await
    }

    async fn rectify_locked(&self, model: &str, id: &str) -> LedgerResult<Change> {
        let change = self.find_or_create_change(model, id).await?;
        self.engine().rectify(&change).await
    }

    /// The record's revision as it stands now; no change entry is written.
    pub async fn current_revision(&self, model: &str, id: &str) -> LedgerResult<Option<Revision>> {
        self.model(model)?;
        let change = match self.find_last_change(model, id).await? {
            Some(change) => change,
            None => Change::new(model, id, 0),
        };
        self.engine().current_revision(&change).await
    }

    /// Mutation-hook entry point. Mutations of untracked models are ignored.
    pub async fn handle_mutation(&self, model: &str, id: &str) -> LedgerResult<Option<Change>> {
        if !self.is_tracked(model) {
            return Ok(None);
        }
        self.rectify(model, id).await.map(Some)
    }

    /// Ensure each id has a change entry and bring it up to date. Backfills
    /// tracking for records that predate it.
    pub async fn rectify_model_changes(&self, model: &str, ids: &[String]) -> LedgerResult<()> {
        self.model(model)?;
        for id in ids {
            self.rectify(model, id).await?;
        }
        debug!(model, count = ids.len(), "rectified model changes");
        Ok(())
    }

    /// Rectify every record and every known change of a model, catching
    /// writes and deletes that bypassed the mutation hook. Returns how many
    /// entries were examined.
    pub async fn rectify_all(&self, model: &str) -> LedgerResult<usize> {
        let tracked = self.model(model)?;
        let mut ids = BTreeSet::new();
        for doc in self.store.find(tracked.data_collection(), &Filter::new()).await? {
            ids.insert(doc.id);
        }
        for change in self.changes(model, &Filter::new()).await? {
            ids.insert(change.model_id);
        }
        let ids: Vec<String> = ids.into_iter().collect();
        self.rectify_model_changes(model, &ids).await?;
        info!(model, count = ids.len(), "rectified all changes");
        Ok(ids.len())
    }

    pub async fn changes(&self, model: &str, filter: &Filter) -> LedgerResult<Vec<Change>> {
        let tracked = self.model(model)?;
        self.store
            .find(&tracked.change_collection(), filter)
            .await?
            .iter()
            .map(|doc| doc.decode().map_err(LedgerError::from))
            .collect()
    }

    /// Changes rectified after checkpoint `since`, oldest first.
    pub async fn changes_since(&self, model: &str, since: u64) -> LedgerResult<Vec<Change>> {
        let filter = Filter::new()
            .gt("checkpoint", since)
            .order_by("checkpoint", Direction::Asc);
        self.changes(model, &filter).await
    }

    /// The dedicated single checkpoint kept for one tracked model.
    pub async fn model_checkpoint(&self, model: &str) -> LedgerResult<Checkpoint> {
        self.model(model)?;
        CheckpointSequencer::new(Arc::clone(&self.store), format!("{model}-Checkpoint"))
            .get_singleton()
            .await
    }
}

impl std::fmt::Debug for ChangeLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut models: Vec<_> = self.models.keys().collect();
        models.sort();
        f.debug_struct("ChangeLedger")
            .field("sequencer", &self.sequencer)
            .field("models", &models)
            .finish()
    }
}

fn record_key(model: &str, id: &str) -> String {
    format!("{model}/{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl_store::InMemoryDataStore;
    use cl_types::ChangeKind;
    use serde_json::json;

    fn note(id: &str, title: &str) -> Document {
        Document::new(id, json!({ "title": title }).as_object().cloned().unwrap())
    }

    fn ledger() -> (Arc<InMemoryDataStore>, ChangeLedger) {
        let store = Arc::new(InMemoryDataStore::new());
        let ledger = ChangeLedger::new(store.clone()).track(TrackedModel::new("Note"));
        (store, ledger)
    }

    // --- find_or_create_change ---

    #[tokio::test]
    async fn new_change_is_untouched_at_current_checkpoint() {
        let (store, ledger) = ledger();
        ledger.sequencer().bump_last_seq(None).await.unwrap();
        let change = ledger.find_or_create_change("Note", "1").await.unwrap();
        assert_eq!(change.rev, None);
        assert_eq!(change.prev, None);
        assert_eq!(change.checkpoint, 1);
        assert_eq!(change.id, ChangeId::for_model("Note", "1"));

        let again = ledger.find_or_create_change("Note", "1").await.unwrap();
        assert_eq!(again, change);
        assert_eq!(store.len("Note-Change"), 1);
    }

    #[tokio::test]
    async fn untracked_model_is_required_model_missing() {
        let (_, ledger) = ledger();
        let err = ledger.find_or_create_change("Ghost", "1").await.unwrap_err();
        assert!(matches!(err, LedgerError::RequiredModelMissing(_)));
        assert!(matches!(
            ledger.record_state("Ghost", "1").await.unwrap(),
            RecordState::NotTracked
        ));
        assert_eq!(ledger.handle_mutation("Ghost", "1").await.unwrap(), None);
    }

    // --- record lifecycle ---

    #[tokio::test]
    async fn create_update_delete_kinds() {
        let (_, ledger) = ledger();
        let created = ledger.save_record("Note", note("1", "a")).await.unwrap();
        assert_eq!(created.kind(), ChangeKind::Create);

        ledger.sequencer().bump_last_seq(None).await.unwrap();
        let updated = ledger.save_record("Note", note("1", "b")).await.unwrap();
        assert_eq!(updated.kind(), ChangeKind::Update);
        assert_eq!(updated.prev, created.rev);

        ledger.sequencer().bump_last_seq(None).await.unwrap();
        let deleted = ledger.delete_record("Note", "1").await.unwrap();
        assert_eq!(deleted.kind(), ChangeKind::Delete);
        assert_eq!(deleted.prev, updated.rev);
        assert_eq!(deleted.checkpoint, 3);
    }

    #[tokio::test]
    async fn checkpoint_never_decreases() {
        let (_, ledger) = ledger();
        let mut last = 0;
        for i in 0..6 {
            if i % 2 == 0 {
                ledger.sequencer().bump_last_seq(None).await.unwrap();
            }
            let change = ledger
                .save_record("Note", note("1", &format!("v{i}")))
                .await
                .unwrap();
            assert!(change.checkpoint >= last);
            last = change.checkpoint;
        }
    }

    #[tokio::test]
    async fn concurrent_rectify_of_one_record_keeps_one_change() {
        let (store, ledger) = ledger();
        let ledger = Arc::new(ledger);
        store.save("Note", note("1", "a")).await.unwrap();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger.rectify("Note", "1").await.unwrap()
            }));
        }
        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap());
        }
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.len("Note-Change"), 1);
    }

    // --- backfill ---

    #[tokio::test]
    async fn rectify_model_changes_backfills() {
        let (store, ledger) = ledger();
        store.save("Note", note("1", "a")).await.unwrap();
        store.save("Note", note("2", "b")).await.unwrap();
        ledger
            .rectify_model_changes("Note", &["1".to_string(), "2".to_string()])
            .await
            .unwrap();
        let changes = ledger.changes("Note", &Filter::new()).await.unwrap();
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.kind() == ChangeKind::Create));
    }

    #[tokio::test]
    async fn rectify_all_sees_untracked_deletes() {
        let (store, ledger) = ledger();
        ledger.save_record("Note", note("1", "a")).await.unwrap();
        store.save("Note", note("2", "b")).await.unwrap();
        ledger.sequencer().bump_last_seq(None).await.unwrap();
        store.delete("Note", "1").await.unwrap();

        assert_eq!(ledger.rectify_all("Note").await.unwrap(), 2);
        let one = ledger.find_last_change("Note", "1").await.unwrap().unwrap();
        assert!(one.is_deleted());
        let two = ledger.find_last_change("Note", "2").await.unwrap().unwrap();
        assert_eq!(two.kind(), ChangeKind::Create);
    }

    // --- queries ---

    #[tokio::test]
    async fn changes_since_filters_and_orders() {
        let (_, ledger) = ledger();
        ledger.save_record("Note", note("a", "1")).await.unwrap();
        ledger.sequencer().bump_last_seq(None).await.unwrap();
        ledger.save_record("Note", note("b", "1")).await.unwrap();
        ledger.sequencer().bump_last_seq(None).await.unwrap();
        ledger.save_record("Note", note("c", "1")).await.unwrap();

        let since = ledger.changes_since("Note", 1).await.unwrap();
        let ids: Vec<_> = since.iter().map(|c| c.model_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn update_last_change_rebases_and_restamps() {
        let (_, ledger) = ledger();
        let created = ledger.save_record("Note", note("1", "a")).await.unwrap();
        ledger.sequencer().bump_last_seq(None).await.unwrap();
        let other = Revision::from_digest([7; 32]);

        let change = ledger
            .update_last_change("Note", "1", Some(other.clone()))
            .await
            .unwrap();
        assert_eq!(change.prev, Some(other));
        assert_eq!(change.rev, created.rev);
        assert_eq!(change.checkpoint, 2);
    }

    // --- guarded apply ---

    #[tokio::test]
    async fn apply_if_unchanged_writes_on_expected_revision() {
        let (_, ledger) = ledger();
        let created = ledger.save_record("Note", note("1", "a")).await.unwrap();
        let outcome = ledger
            .apply_if_unchanged("Note", "1", &[created.rev.clone()], Some(note("1", "b")))
            .await
            .unwrap();
        let ApplyOutcome::Applied(change) = outcome else {
            panic!("expected apply");
        };
        assert_eq!(change.rev, Some(ChangeLedger::revision_for_record(&note("1", "b"))));
    }

    #[tokio::test]
    async fn apply_if_unchanged_reports_stale() {
        let (store, ledger) = ledger();
        ledger.save_record("Note", note("1", "a")).await.unwrap();
        let outcome = ledger
            .apply_if_unchanged("Note", "1", &[None], None)
            .await
            .unwrap();
        assert!(matches!(outcome, ApplyOutcome::Stale(_)));
        assert_eq!(store.len("Note"), 1);
    }

    #[tokio::test]
    async fn current_revision_tracks_live_data() {
        let (store, ledger) = ledger();
        assert_eq!(ledger.current_revision("Note", "1").await.unwrap(), None);
        store.save("Note", note("1", "a")).await.unwrap();
        assert_eq!(
            ledger.current_revision("Note", "1").await.unwrap(),
            Some(ChangeLedger::revision_for_record(&note("1", "a")))
        );
        assert_eq!(ledger.find_last_change("Note", "1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn model_checkpoint_is_a_singleton() {
        let (store, ledger) = ledger();
        let a = ledger.model_checkpoint("Note").await.unwrap();
        let b = ledger.model_checkpoint("Note").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len("Note-Checkpoint"), 1);
    }
}
