use std::sync::Arc;

use async_trait::async_trait;
use cl_ledger::{ApplyOutcome, ChangeLedger};
use cl_store::{Document, Filter};
use cl_types::{Change, Revision};
use serde_json::Value;
use tracing::{debug, warn};

use crate::conflict::Conflict;
use crate::diff::DiffEngine;
use crate::error::SyncResult;
use crate::types::{BulkResult, DiffResult, Update};

/// One side of a replication pass.
#[async_trait]
pub trait Replica: Send + Sync {
    /// Stable identifier, recorded as the `source_id` of checkpoints this
    /// replica's peers open.
    fn id(&self) -> &str;

    /// Fail with `RequiredModelMissing` unless `model` has change tracking.
    async fn ensure_tracked(&self, model: &str) -> SyncResult<()>;

    async fn changes(&self, model: &str, filter: &Filter) -> SyncResult<Vec<Change>>;

    /// Compare incoming changes with this replica's changes at checkpoints
    /// `>= since`.
    async fn diff(&self, model: &str, since: u64, remote: Vec<Change>) -> SyncResult<DiffResult>;

    /// Pair each delta with the record data to send.
    async fn create_updates(&self, model: &str, deltas: Vec<Change>) -> SyncResult<Vec<Update>>;

    /// Apply updates whose expected prior state still holds; report the rest
    /// as conflicts.
    async fn bulk_update(&self, model: &str, updates: Vec<Update>) -> SyncResult<BulkResult>;

    /// Open a new checkpoint and return its sequence.
    async fn checkpoint(&self, source_id: Option<String>) -> SyncResult<u64>;

    async fn find_last_change(&self, model: &str, id: &str) -> SyncResult<Option<Change>>;

    async fn update_last_change(
        &self,
        model: &str,
        id: &str,
        prev: Option<Revision>,
    ) -> SyncResult<Change>;

    async fn find_record(&self, model: &str, id: &str) -> SyncResult<Option<Document>>;

    async fn put_record(&self, model: &str, doc: Document) -> SyncResult<Change>;

    async fn remove_record(&self, model: &str, id: &str) -> SyncResult<Change>;
}

/// A replica backed by an in-process [`ChangeLedger`].
#[derive(Clone, Debug)]
pub struct LocalReplica {
    id: String,
    ledger: Arc<ChangeLedger>,
}

impl LocalReplica {
    /// A replica with a fresh random id.
    pub fn new(ledger: Arc<ChangeLedger>) -> Self {
        Self::with_id(uuid::Uuid::now_v7().to_string(), ledger)
    }

    pub fn with_id(id: impl Into<String>, ledger: Arc<ChangeLedger>) -> Self {
        Self {
            id: id.into(),
            ledger,
        }
    }

    pub fn ledger(&self) -> &Arc<ChangeLedger> {
        &self.ledger
    }
}

#[async_trait]
impl Replica for LocalReplica {
    fn id(&self) -> &str {
        &self.id
    }

    async fn ensure_tracked(&self, model: &str) -> SyncResult<()> {
        self.ledger.model(model)?;
        Ok(())
    }

    async fn changes(&self, model: &str, filter: &Filter) -> SyncResult<Vec<Change>> {
        Ok(self.ledger.changes(model, filter).await?)
    }

    async fn diff(&self, model: &str, since: u64, remote: Vec<Change>) -> SyncResult<DiffResult> {
        if remote.is_empty() {
            return Ok(DiffResult::default());
        }
        let ids: Vec<Value> = remote
            .iter()
            .map(|c| Value::String(c.model_id.clone()))
            .collect();
        let filter = Filter::new().gte("checkpoint", since).is_in("modelId", ids);
        let local = self.ledger.changes(model, &filter).await?;
        let result = DiffEngine::diff(&local, remote);
        debug!(
            replica = %self.id,
            model,
            since,
            deltas = result.deltas.len(),
            conflicts = result.conflicts.len(),
            "diff"
        );
        Ok(result)
    }

    async fn create_updates(&self, model: &str, deltas: Vec<Change>) -> SyncResult<Vec<Update>> {
        let mut updates = Vec::with_capacity(deltas.len());
        for change in deltas {
            let update = match self.ledger.find_record(model, &change.model_id).await? {
                Some(document) => Update::Save { change, document },
                None => Update::Delete { change },
            };
            updates.push(update);
        }
        Ok(updates)
    }

    async fn bulk_update(&self, model: &str, updates: Vec<Update>) -> SyncResult<BulkResult> {
        let mut result = BulkResult::default();
        for update in updates {
            let (change, data) = match update {
                Update::Save { change, document } => (change, Some(document)),
                Update::Delete { change } => (change, None),
            };
            let expected = [change.prev.clone(), change.rev.clone()];
            match self
                .ledger
                .apply_if_unchanged(model, &change.model_id, &expected, data)
                .await?
            {
                ApplyOutcome::Applied(local) => result.applied.push(local),
                ApplyOutcome::Stale(local) => {
                    let conflict = Conflict::new(change, local);
                    warn!(replica = %self.id, %conflict, "update refused, record changed locally");
                    result.conflicts.push(conflict);
                }
            }
        }
        Ok(result)
    }

    async fn checkpoint(&self, source_id: Option<String>) -> SyncResult<u64> {
        Ok(self.ledger.sequencer().bump_last_seq(source_id).await?)
    }

    async fn find_last_change(&self, model: &str, id: &str) -> SyncResult<Option<Change>> {
        Ok(self.ledger.find_last_change(model, id).await?)
    }

    async fn update_last_change(
        &self,
        model: &str,
        id: &str,
        prev: Option<Revision>,
    ) -> SyncResult<Change> {
        Ok(self.ledger.update_last_change(model, id, prev).await?)
    }

    async fn find_record(&self, model: &str, id: &str) -> SyncResult<Option<Document>> {
        Ok(self.ledger.find_record(model, id).await?)
    }

    async fn put_record(&self, model: &str, doc: Document) -> SyncResult<Change> {
        Ok(self.ledger.save_record(model, doc).await?)
    }

    async fn remove_record(&self, model: &str, id: &str) -> SyncResult<Change> {
        Ok(self.ledger.delete_record(model, id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl_ledger::TrackedModel;
    use cl_store::InMemoryDataStore;
    use serde_json::json;

    fn replica(id: &str) -> LocalReplica {
        let store = Arc::new(InMemoryDataStore::new());
        let ledger = ChangeLedger::new(store).track(TrackedModel::new("Note"));
        LocalReplica::with_id(id, Arc::new(ledger))
    }

    fn note(id: &str, title: &str) -> Document {
        Document::new(id, json!({ "title": title }).as_object().cloned().unwrap())
    }

    #[test]
    fn new_replicas_get_distinct_ids() {
        let store = Arc::new(InMemoryDataStore::new());
        let ledger = Arc::new(ChangeLedger::new(store));
        let a = LocalReplica::new(Arc::clone(&ledger));
        let b = LocalReplica::new(ledger);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn ensure_tracked_rejects_unknown_models() {
        let r = replica("src");
        r.ensure_tracked("Note").await.unwrap();
        let err = r.ensure_tracked("Ghost").await.unwrap_err();
        assert!(matches!(
            err,
            crate::SyncError::Ledger(cl_ledger::LedgerError::RequiredModelMissing(ref m)) if m == "Ghost"
        ));
    }

    #[tokio::test]
    async fn create_updates_pairs_data_or_delete() {
        let r = replica("src");
        let kept = r.put_record("Note", note("a", "x")).await.unwrap();
        r.put_record("Note", note("b", "y")).await.unwrap();
        let gone = r.remove_record("Note", "b").await.unwrap();

        let updates = r.create_updates("Note", vec![kept, gone]).await.unwrap();
        assert!(matches!(&updates[0], Update::Save { document, .. } if document.id == "a"));
        assert!(matches!(&updates[1], Update::Delete { change } if change.model_id == "b"));
    }

    #[tokio::test]
    async fn bulk_update_applies_fresh_and_refuses_stale() {
        let source = replica("src");
        let target = replica("dst");
        let created = source.put_record("Note", note("a", "v1")).await.unwrap();
        target.put_record("Note", note("b", "local")).await.unwrap();

        let mut stale = created.clone();
        stale.model_id = "b".into();
        let updates = vec![
            Update::Save {
                change: created.clone(),
                document: note("a", "v1"),
            },
            Update::Save {
                change: stale,
                document: note("b", "v1"),
            },
        ];
        let result = target.bulk_update("Note", updates).await.unwrap();
        assert_eq!(result.applied.len(), 1);
        assert_eq!(result.applied[0].rev, created.rev);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].model_id, "b");
        let b = target.find_record("Note", "b").await.unwrap().unwrap();
        assert_eq!(b.fields["title"], "local");
    }

    #[tokio::test]
    async fn diff_only_considers_recent_local_changes() {
        let target = replica("dst");
        target.put_record("Note", note("a", "old")).await.unwrap();
        let since = target.checkpoint(None).await.unwrap();

        let mut incoming = Change::new("Note", "a", 1);
        incoming.rev = Some(Revision::from_digest([9; 32]));
        let result = target.diff("Note", since, vec![incoming.clone()]).await.unwrap();
        assert_eq!(result.deltas, vec![incoming.clone()]);

        let result = target.diff("Note", 0, vec![incoming]).await.unwrap();
        assert_eq!(result.conflicts.len(), 1);
    }
}
