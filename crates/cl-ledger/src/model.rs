use cl_store::Document;
use serde::{Deserialize, Serialize};

/// Registration of a record type whose mutations are change-tracked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedModel {
    /// Model name recorded on every change (`modelName`).
    pub name: String,
    /// Collection holding the records. Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Collection holding the change entries. Defaults to `"{name}-Change"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_collection: Option<String>,
    /// Record fields copied onto each change so replication can scope by
    /// them (e.g. a tenant id).
    #[serde(default)]
    pub extra_fields: Vec<String>,
}

impl TrackedModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: None,
            change_collection: None,
            extra_fields: Vec::new(),
        }
    }

    pub fn with_extra_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn data_collection(&self) -> &str {
        self.collection.as_deref().unwrap_or(&self.name)
    }

    pub fn change_collection(&self) -> String {
        self.change_collection
            .clone()
            .unwrap_or_else(|| format!("{}-Change", self.name))
    }
}

/// What the data store currently holds for a tracked record id.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordState {
    Found(Document),
    /// The model is tracked but the record is gone; rectifies to a tombstone.
    Deleted,
    /// The model has no change tracking configured.
    NotTracked,
}

impl RecordState {
    pub fn document(&self) -> Option<&Document> {
        match self {
            Self::Found(doc) => Some(doc),
            _ => None,
        }
    }
}
