use cl_chunk::{concat_results, ChunkResult};
use cl_store::Document;
use cl_types::Change;
use serde::{Deserialize, Serialize};

use crate::conflict::Conflict;
use crate::watermark::Watermark;

/// A write prepared on the source for the target to apply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Update {
    Save { change: Change, document: Document },
    Delete { change: Change },
}

impl Update {
    pub fn change(&self) -> &Change {
        match self {
            Self::Save { change, .. } | Self::Delete { change } => change,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.change().model_id
    }
}

/// Outcome of comparing incoming changes with a replica's own.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiffResult {
    /// Changes safe to apply.
    pub deltas: Vec<Change>,
    pub conflicts: Vec<Conflict>,
}

impl ChunkResult for DiffResult {
    fn concat(self, other: Self) -> Self {
        Self {
            deltas: concat_results(self.deltas, other.deltas),
            conflicts: concat_results(self.conflicts, other.conflicts),
        }
    }
}

/// Outcome of applying updates on a target.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BulkResult {
    /// The target's changes after each applied update.
    pub applied: Vec<Change>,
    /// Updates refused because the target record moved on.
    pub conflicts: Vec<Conflict>,
}

impl ChunkResult for BulkResult {
    fn concat(self, other: Self) -> Self {
        Self {
            applied: concat_results(self.applied, other.applied),
            conflicts: concat_results(self.conflicts, other.conflicts),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicateOptions {
    /// Page size for every chunked step; zero disables chunking.
    pub chunk_size: usize,
    /// Advance the watermark past conflicted changes too.
    pub force: bool,
}

impl Default for ReplicateOptions {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            force: false,
        }
    }
}

/// Summary of one replication pass.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplicationReport {
    pub conflicts: Vec<Conflict>,
    /// Number of updates the target applied.
    pub applied: usize,
    /// Source changes with `since < checkpoint <= sealed` were transferred.
    pub since: u64,
    pub sealed: u64,
    /// Watermark stored for the next pass.
    pub watermark: Watermark,
    /// Checkpoint the target opened after applying.
    pub target_checkpoint: u64,
}

impl ReplicationReport {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl_types::Revision;

    fn change(id: &str) -> Change {
        let mut c = Change::new("Note", id, 1);
        c.rev = Some(Revision::from_digest([1; 32]));
        c
    }

    #[test]
    fn diff_results_concat_per_field() {
        let a = DiffResult {
            deltas: vec![change("a")],
            conflicts: vec![],
        };
        let b = DiffResult {
            deltas: vec![change("b")],
            conflicts: vec![Conflict::new(change("c"), Change::new("Note", "c", 1))],
        };
        let merged = concat_results(a, b);
        let ids: Vec<_> = merged.deltas.iter().map(|c| c.model_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(merged.conflicts.len(), 1);
        assert_eq!(merged.conflicts[0].model_id, "c");
    }

    #[test]
    fn update_serializes_with_type_tag() {
        let update = Update::Delete { change: change("x") };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["type"], "delete");
        assert_eq!(json["change"]["modelId"], "x");
        assert_eq!(update.model_id(), "x");
    }

    #[test]
    fn default_options() {
        let o = ReplicateOptions::default();
        assert_eq!(o.chunk_size, 100);
        assert!(!o.force);
    }
}
