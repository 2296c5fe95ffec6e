use std::path::Path;

use cl_ledger::{TrackedModel, DEFAULT_CHECKPOINT_COLLECTION};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::types::ReplicateOptions;
use crate::watermark::DEFAULT_WATERMARK_COLLECTION;

/// Replication settings, usually read from a TOML file.
///
/// ```toml
/// chunk_size = 50
/// force_apply = false
///
/// [[models]]
/// name = "Note"
/// extra_fields = ["tenantId"]
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    pub chunk_size: usize,
    pub force_apply: bool,
    pub watermark_collection: String,
    pub checkpoint_collection: String,
    pub models: Vec<TrackedModel>,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            force_apply: false,
            watermark_collection: DEFAULT_WATERMARK_COLLECTION.to_string(),
            checkpoint_collection: DEFAULT_CHECKPOINT_COLLECTION.to_string(),
            models: Vec::new(),
        }
    }
}

impl ReplicationConfig {
    pub fn from_toml_str(s: &str) -> SyncResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> SyncResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn to_toml_string(&self) -> SyncResult<String> {
        toml::to_string(self).map_err(|e| SyncError::Config(e.to_string()))
    }

    pub fn options(&self) -> ReplicateOptions {
        ReplicateOptions {
            chunk_size: self.chunk_size,
            force: self.force_apply,
        }
    }

    pub fn model(&self, name: &str) -> Option<&TrackedModel> {
        self.models.iter().find(|m| m.name == name)
    }

    fn validate(&self) -> SyncResult<()> {
        let mut names = std::collections::HashSet::new();
        for model in &self.models {
            if model.name.is_empty() {
                return Err(SyncError::Config("model name must not be empty".into()));
            }
            if !names.insert(model.name.as_str()) {
                return Err(SyncError::Config(format!("model {:?} listed twice", model.name)));
            }
        }
        Ok(())
    }
}
