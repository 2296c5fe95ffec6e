use cl_store::Document;
use cl_types::{Change, Revision};
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::ChangeLedger;
use crate::model::{RecordState, TrackedModel};

/// How a rectification changed a [`Change`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RectifyOutcome {
    /// The record still hashes to `rev`; nothing was written.
    Unchanged,
    /// Another edit inside the same checkpoint; only `rev` moved.
    Merged,
    /// First edit in a newer checkpoint; the old `rev` became `prev`.
    Advanced,
}

/// Apply the merge rules to `change` given the record's current revision
/// and the store's current checkpoint.
///
/// Edits within one checkpoint collapse: `prev` keeps the revision from
/// before the checkpoint's first edit and only `rev` follows the data. A
/// newer checkpoint opens a fresh boundary no matter how many sequences
/// were skipped. `checkpoint` never decreases.
pub fn advance(change: &mut Change, current: Option<Revision>, checkpoint: u64) -> RectifyOutcome {
    if change.rev == current {
        return RectifyOutcome::Unchanged;
    }
    if checkpoint > change.checkpoint {
        change.prev = change.rev.take();
        change.rev = current;
        change.checkpoint = checkpoint;
        RectifyOutcome::Advanced
    } else {
        change.rev = current;
        RectifyOutcome::Merged
    }
}

/// Reconciles change entries with the live records they describe.
pub struct RectifyEngine<'a> {
    ledger: &'a ChangeLedger,
}

impl<'a> RectifyEngine<'a> {
    pub fn new(ledger: &'a ChangeLedger) -> Self {
        Self { ledger }
    }

    /// Bring `change` up to date with its record and persist the result.
    ///
    /// Idempotent: a second call with no intervening data change returns an
    /// identical entry without writing. Not atomic across its reads and the
    /// final save, so callers serialize per record (see
    /// [`ChangeLedger::rectify`]).
    pub async fn rectify(&self, change: &Change) -> LedgerResult<Change> {
        let model = self.ledger.model(&change.model_name)?;
        let state = self
            .ledger
            .record_state(&change.model_name, &change.model_id)
            .await?;
        let current = revision_for_state(&change.model_name, &state)?;

        if change.rev == current {
            debug!(model = %change.model_name, id = %change.model_id, "rectify: unchanged");
            return Ok(change.clone());
        }

        let checkpoint = self.ledger.sequencer().current().await?;
        let mut updated = change.clone();
        let outcome = advance(&mut updated, current, checkpoint);
        if let Some(doc) = state.document() {
            copy_extra_fields(model, doc, &mut updated);
        }

        self.ledger
            .store()
            .save(&model.change_collection(), Document::from_serializable(&updated)?)
            .await?;
        debug!(
            model = %updated.model_name,
            id = %updated.model_id,
            ?outcome,
            checkpoint = updated.checkpoint,
            kind = %updated.kind(),
            "rectify"
        );
        Ok(updated)
    }

    /// Recompute the record's revision without touching the change entry.
    pub async fn current_revision(&self, change: &Change) -> LedgerResult<Option<Revision>> {
        let state = self
            .ledger
            .record_state(&change.model_name, &change.model_id)
            .await?;
        revision_for_state(&change.model_name, &state)
    }
}

fn revision_for_state(model: &str, state: &RecordState) -> LedgerResult<Option<Revision>> {
    match state {
        RecordState::Found(doc) => Ok(Some(ChangeLedger::revision_for_record(doc))),
        RecordState::Deleted => Ok(None),
        RecordState::NotTracked => Err(LedgerError::RequiredModelMissing(model.to_string())),
    }
}

fn copy_extra_fields(model: &TrackedModel, doc: &Document, change: &mut Change) {
    for name in &model.extra_fields {
        if let Some(value) = doc.field(name) {
            change.extra.insert(name.clone(), value);
        }
    }
}
