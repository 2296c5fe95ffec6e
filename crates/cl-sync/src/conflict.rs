use std::fmt;

use cl_store::Document;
use cl_types::Change;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::SyncResult;
use crate::replica::Replica;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    /// Both sides changed the record to different data.
    #[serde(rename = "update-update")]
    UpdateUpdate,
    /// One side changed the record while the other deleted it.
    #[serde(rename = "update-delete")]
    UpdateDelete,
}

impl ConflictKind {
    pub fn classify(source: &Change, target: &Change) -> Self {
        if source.is_deleted() || target.is_deleted() {
            Self::UpdateDelete
        } else {
            Self::UpdateUpdate
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpdateUpdate => f.write_str("UPDATE-UPDATE"),
            Self::UpdateDelete => f.write_str("UPDATE-DELETE"),
        }
    }
}

/// A record that changed independently on both sides since their last
/// common checkpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub model_name: String,
    pub model_id: String,
    pub source_change: Change,
    pub target_change: Change,
    pub kind: ConflictKind,
}

impl Conflict {
    pub fn new(source_change: Change, target_change: Change) -> Self {
        Self {
            model_name: source_change.model_name.clone(),
            model_id: source_change.model_id.clone(),
            kind: ConflictKind::classify(&source_change, &target_change),
            source_change,
            target_change,
        }
    }

    /// The same conflict seen from the opposite replication direction.
    pub fn swap_parties(&self) -> Self {
        Self {
            model_name: self.model_name.clone(),
            model_id: self.model_id.clone(),
            source_change: self.target_change.clone(),
            target_change: self.source_change.clone(),
            kind: self.kind,
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.kind, self.model_name, self.model_id)
    }
}

/// Settles conflicts so the next pass between the same pair applies cleanly.
///
/// Every strategy ends by rebasing the source change onto the target's
/// current revision; the source data at that point is what the next pass
/// sends.
pub struct ConflictResolver<'a> {
    source: &'a dyn Replica,
    target: &'a dyn Replica,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(source: &'a dyn Replica, target: &'a dyn Replica) -> Self {
        Self { source, target }
    }

    /// Mark the source change as based on the target's current revision.
    pub async fn resolve(&self, conflict: &Conflict) -> SyncResult<Change> {
        let target_rev = match self
            .target
            .find_last_change(&conflict.model_name, &conflict.model_id)
            .await?
        {
            Some(change) => change.rev,
            None => conflict.target_change.rev.clone(),
        };
        let change = self
            .source
            .update_last_change(&conflict.model_name, &conflict.model_id, target_rev)
            .await?;
        info!(model = %conflict.model_name, id = %conflict.model_id, kind = %conflict.kind, "conflict resolved");
        Ok(change)
    }

    /// Keep the source data.
    pub async fn resolve_using_source(&self, conflict: &Conflict) -> SyncResult<Change> {
        self.resolve(conflict).await
    }

    /// Copy the target's data (or its deletion) to the source, then resolve.
    pub async fn resolve_using_target(&self, conflict: &Conflict) -> SyncResult<Change> {
        match self
            .target
            .find_record(&conflict.model_name, &conflict.model_id)
            .await?
        {
            Some(doc) => self.source.put_record(&conflict.model_name, doc).await?,
            None => {
                self.source
                    .remove_record(&conflict.model_name, &conflict.model_id)
                    .await?
            }
        };
        self.resolve(conflict).await
    }

    /// Write merged data to the source (`None` deletes), then resolve.
    pub async fn resolve_manually(
        &self,
        conflict: &Conflict,
        data: Option<Map<String, Value>>,
    ) -> SyncResult<Change> {
        match data {
            Some(fields) => {
                let doc = Document::new(conflict.model_id.clone(), fields);
                self.source.put_record(&conflict.model_name, doc).await?
            }
            None => {
                self.source
                    .remove_record(&conflict.model_name, &conflict.model_id)
                    .await?
            }
        };
        self.resolve(conflict).await
    }
}
