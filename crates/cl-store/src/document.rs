use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

const ID_FIELD: &str = "id";

/// A stored row: an id plus its persisted fields.
///
/// `fields` never contains the `id` key; it is held separately so stores can
/// index by it. The JSON form flattens both back into one object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, mut fields: Map<String, Value>) -> Self {
        fields.remove(ID_FIELD);
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Serialize a value that carries its own string `id` field.
    pub fn from_serializable<T: Serialize>(value: &T) -> StoreResult<Self> {
        let mut fields = to_object(value)?;
        match fields.remove(ID_FIELD) {
            Some(Value::String(id)) => Ok(Self { id, fields }),
            Some(other) => Err(StoreError::InvalidDocument(format!(
                "id must be a string, got {other}"
            ))),
            None => Err(StoreError::InvalidDocument("missing id field".into())),
        }
    }

    /// Serialize a value under an explicit id.
    pub fn with_id<T: Serialize>(id: impl Into<String>, value: &T) -> StoreResult<Self> {
        Ok(Self::new(id, to_object(value)?))
    }

    /// Decode into a typed value. The id is visible to the target type as `id`.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        let mut object = self.fields.clone();
        object.insert(ID_FIELD.into(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(object))
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Value of a field, treating `id` as a regular string field.
    pub fn field(&self, name: &str) -> Option<Value> {
        if name == ID_FIELD {
            return Some(Value::String(self.id.clone()));
        }
        self.fields.get(name).cloned()
    }
}

fn to_object<T: Serialize>(value: &T) -> StoreResult<Map<String, Value>> {
    match serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(format!(
            "expected an object, got {other}"
        ))),
    }
}
