use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// One point in a store's monotonic checkpoint sequence.
///
/// Checkpoints are never mutated once written. Advancing the sequence
/// creates a new row with `seq = max + 1`; the previous rows are kept so the
/// sequence history stays inspectable.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Strictly increasing within a store, starting at 1.
    pub seq: u64,
    /// Wall-clock time the checkpoint was created.
    pub time: DateTime<Utc>,
    /// Replica that requested the bump, when it was caused by replication.
    #[serde(default)]
    pub source_id: Option<String>,
}

impl Checkpoint {
    /// The first checkpoint of a store.
    pub fn first() -> Self {
        Self {
            seq: 1,
            time: Utc::now(),
            source_id: None,
        }
    }

    /// A checkpoint at an explicit sequence number.
    pub fn at(seq: u64, source_id: Option<String>) -> Result<Self, TypeError> {
        if seq == 0 {
            return Err(TypeError::InvalidSequence(seq));
        }
        Ok(Self {
            seq,
            time: Utc::now(),
            source_id,
        })
    }

    /// The checkpoint that follows this one.
    pub fn next(&self, source_id: Option<String>) -> Self {
        Self {
            seq: self.seq + 1,
            time: Utc::now(),
            source_id,
        }
    }

    /// Returns `true` if this checkpoint was created after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self.seq > other.seq
    }
}

impl fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checkpoint(#{} @ {})", self.seq, self.time.to_rfc3339())
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_is_seq_one() {
        let cp = Checkpoint::first();
        assert_eq!(cp.seq, 1);
        assert!(cp.source_id.is_none());
    }

    #[test]
    fn zero_sequence_rejected() {
        assert_eq!(
            Checkpoint::at(0, None).unwrap_err(),
            TypeError::InvalidSequence(0)
        );
    }

    #[test]
    fn next_increments_and_records_source() {
        let cp = Checkpoint::at(4, None).unwrap();
        let next = cp.next(Some("replica-b".into()));
        assert_eq!(next.seq, 5);
        assert_eq!(next.source_id.as_deref(), Some("replica-b"));
        assert!(next.is_after(&cp));
        assert!(!cp.is_after(&next));
    }

    #[test]
    fn serde_uses_camel_case() {
        let cp = Checkpoint::at(3, Some("src".into())).unwrap();
        let json = serde_json::to_value(&cp).unwrap();
        assert_eq!(json["seq"], 3);
        assert_eq!(json["sourceId"], "src");
        let parsed: Checkpoint = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, cp);
    }

    #[test]
    fn display_format() {
        let cp = Checkpoint::at(12, None).unwrap();
        assert_eq!(format!("{cp}"), "#12");
    }
}
