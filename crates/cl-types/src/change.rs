use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::revision::{ChangeId, Revision};

/// Classification of a change derived from its `(prev, rev)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Tracked mutation state for a single record.
///
/// There is exactly one `Change` per `(model_name, model_id)`; its `id` is
/// derived from that pair. The entry is rewritten on every rectification and
/// is never removed: a deleted record is represented by `rev == None`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub id: ChangeId,
    /// Revision of the record's current data; `None` once deleted.
    pub rev: Option<Revision>,
    /// Revision captured before the current checkpoint's edits began.
    pub prev: Option<Revision>,
    /// Checkpoint in effect at the last rectification.
    pub checkpoint: u64,
    pub model_name: String,
    pub model_id: String,
    /// Scoping fields copied from the record (e.g. a tenant id).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Change {
    /// A fresh, untouched change entry for a record.
    pub fn new(model_name: impl Into<String>, model_id: impl Into<String>, checkpoint: u64) -> Self {
        let model_name = model_name.into();
        let model_id = model_id.into();
        Self {
            id: ChangeId::for_model(&model_name, &model_id),
            rev: None,
            prev: None,
            checkpoint,
            model_name,
            model_id,
            extra: Map::new(),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match (&self.prev, &self.rev) {
            (Some(_), Some(_)) => ChangeKind::Update,
            (None, Some(_)) => ChangeKind::Create,
            (_, None) => ChangeKind::Delete,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.rev.is_none()
    }

    /// Same current revision (two tombstones compare equal).
    pub fn equals(&self, other: &Change) -> bool {
        self.rev == other.rev
    }

    /// Returns `true` if this change was made on top of `other`'s revision.
    pub fn is_based_on(&self, other: &Change) -> bool {
        self.prev == other.rev
    }

    pub fn both_deleted(a: &Change, b: &Change) -> bool {
        a.kind() == ChangeKind::Delete && b.kind() == ChangeKind::Delete
    }

    /// Returns `true` if this change and `other` diverged independently.
    pub fn conflicts_with(&self, other: &Change) -> bool {
        if self.equals(other) || Self::both_deleted(self, other) {
            return false;
        }
        !self.is_based_on(other)
    }
}

impl fmt::Debug for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = |r: &Option<Revision>| r.as_ref().map_or("null", Revision::short).to_string();
        write!(
            f,
            "Change({}:{} {} prev={} rev={} cp={})",
            self.model_name,
            self.model_id,
            self.kind(),
            short(&self.prev),
            short(&self.rev),
            self.checkpoint
        )
    }
}
