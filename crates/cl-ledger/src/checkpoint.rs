use std::sync::Arc;

use cl_store::{DataStore, Direction, Document, Filter, StoreError};
use cl_types::Checkpoint;
use tracing::{debug, info};

use crate::error::LedgerResult;

/// Collection holding a store's shared checkpoint sequence.
pub const DEFAULT_CHECKPOINT_COLLECTION: &str = "Checkpoint";

const SINGLETON_ID: &str = "singleton";

/// Monotonic checkpoint sequence for one store.
///
/// One sequencer is shared by every tracked record type of a store. It is an
/// explicit service bound to a store handle; there is no process-wide
/// "current checkpoint".
#[derive(Clone)]
pub struct CheckpointSequencer {
    store: Arc<dyn DataStore>,
    collection: String,
}

impl CheckpointSequencer {
    pub fn new(store: Arc<dyn DataStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Sequencer over [`DEFAULT_CHECKPOINT_COLLECTION`].
    pub fn with_default_collection(store: Arc<dyn DataStore>) -> Self {
        Self::new(store, DEFAULT_CHECKPOINT_COLLECTION)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The checkpoint with the highest sequence, if any exists.
    pub async fn latest(&self) -> LedgerResult<Option<Checkpoint>> {
        let filter = Filter::new().order_by("seq", Direction::Desc).limit(1);
        let docs = self.store.find(&self.collection, &filter).await?;
        match docs.first() {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Highest existing sequence; creates `seq = 1` on first use.
    ///
    /// Creation goes through the store's atomic find-or-create, so
    /// concurrent first callers agree on a single row.
    pub async fn current(&self) -> LedgerResult<u64> {
        if let Some(cp) = self.latest().await? {
            return Ok(cp.seq);
        }
        let first = Checkpoint::first();
        let (doc, created) = self
            .store
            .find_or_create(
                &self.collection,
                &Filter::new().eq("seq", first.seq),
                checkpoint_document(&first)?,
            )
            .await?;
        if created {
            info!(collection = %self.collection, "created first checkpoint");
        }
        Ok(doc.decode::<Checkpoint>()?.seq)
    }

    /// Create a new checkpoint one past the current maximum and return it.
    ///
    /// Racing bumpers may both observe the same maximum; the loser's create
    /// collides on the row id and it returns the winner's sequence.
    pub async fn bump_last_seq(&self, source_id: Option<String>) -> LedgerResult<u64> {
        let next = match self.latest().await? {
            Some(cp) => cp.next(source_id),
            None => Checkpoint::at(1, source_id)?,
        };
        let seq = next.seq;
        match self
            .store
            .create(&self.collection, checkpoint_document(&next)?)
            .await
        {
            Ok(_) => {
                info!(collection = %self.collection, seq, source = ?next.source_id, "checkpoint bumped");
                Ok(seq)
            }
            Err(StoreError::AlreadyExists { .. }) => {
                debug!(collection = %self.collection, seq, "concurrent bump created the same checkpoint");
                Ok(seq)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The single checkpoint of this sequencer's collection, seeded with
    /// `seq = 1` when absent.
    ///
    /// Used for scopes that hold exactly one checkpoint, such as a dedicated
    /// checkpoint collection per tracked record type.
    pub async fn get_singleton(&self) -> LedgerResult<Checkpoint> {
        let initial = Document::with_id(SINGLETON_ID, &Checkpoint::first())?;
        let (doc, _) = self
            .store
            .find_or_create(&self.collection, &Filter::new().eq("id", SINGLETON_ID), initial)
            .await?;
        Ok(doc.decode()?)
    }
}

impl std::fmt::Debug for CheckpointSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointSequencer")
            .field("collection", &self.collection)
            .finish()
    }
}

/// Rows are keyed by the zero-padded sequence so id order is numeric order.
fn checkpoint_document(cp: &Checkpoint) -> LedgerResult<Document> {
    Ok(Document::with_id(format!("{:020}", cp.seq), cp)?)
}
