use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const DIGEST_HEX_LEN: usize = 64;

/// Domain tag for change identifiers. Kept apart from revision hashing so a
/// change id can never equal the revision of some record's data.
const CHANGE_ID_DOMAIN: &str = "cl-change-id-v1";

/// Content hash of one record's data.
///
/// A `Revision` is the lowercase hex encoding of a 32-byte BLAKE3 digest.
/// Two records with the same logical data always share a revision. The
/// absence of a revision (`Option::None` on a [`Change`](crate::Change))
/// is the tombstone of a deleted record.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Revision(String);

impl Revision {
    /// Wrap a raw digest.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    /// Parse a revision from its hex form.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        if s.len() != DIGEST_HEX_LEN {
            return Err(TypeError::InvalidLength {
                expected: DIGEST_HEX_LEN,
                actual: s.len(),
            });
        }
        hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short hex representation (first 8 characters).
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl TryFrom<String> for Revision {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Revision> for String {
    fn from(rev: Revision) -> Self {
        rev.0
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Revision({})", self.short())
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the single [`Change`](crate::Change) entry tracking one record.
///
/// Derived deterministically from `"{model_name}-{model_id}"`, so every
/// replica computes the same id for the same record without coordination.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(String);

impl ChangeId {
    pub fn for_model(model_name: &str, model_id: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(CHANGE_ID_DOMAIN.as_bytes());
        hasher.update(b":");
        hasher.update(model_name.as_bytes());
        hasher.update(b"-");
        hasher.update(model_id.as_bytes());
        Self(hex::encode(hasher.finalize().as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChangeId({})", &self.0[..self.0.len().min(8)])
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ChangeId> for String {
    fn from(id: ChangeId) -> Self {
        id.0
    }
}
