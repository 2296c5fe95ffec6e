use cl_types::Revision;
use serde_json::{Map, Value};

use crate::canonical::CanonicalEncoder;

/// Domain-separated BLAKE3 revision hasher.
///
/// Each hasher carries a domain tag (e.g. `"cl-revision-v1"`) that is
/// prepended to every hash computation. The hashed payload is the canonical
/// encoding of a JSON value: object keys are sorted and every value is tagged
/// with its type, so the same logical data always produces the same revision
/// and `1`, `1.0`, `"1"` and `true` never share one.
pub struct RevisionHasher {
    domain: &'static str,
}

impl RevisionHasher {
    /// Hasher for record data revisions.
    pub const REVISION: Self = Self {
        domain: "cl-revision-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Revision of a record's persisted field set.
    pub fn hash_fields(&self, fields: &Map<String, Value>) -> Revision {
        let mut hasher = self.start();
        CanonicalEncoder::new(&mut hasher).encode_object(fields);
        Revision::from_digest(*hasher.finalize().as_bytes())
    }

    /// Revision of an arbitrary JSON value.
    pub fn hash_value(&self, value: &Value) -> Revision {
        let mut hasher = self.start();
        CanonicalEncoder::new(&mut hasher).encode(value);
        Revision::from_digest(*hasher.finalize().as_bytes())
    }

    /// Revision of a serializable value, via its JSON form.
    pub fn hash_serializable<T: serde::Serialize>(&self, value: &T) -> Result<Revision, HasherError> {
        let value =
            serde_json::to_value(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash_value(&value))
    }

    /// Verify that a field set produces the expected revision.
    pub fn verify(&self, fields: &Map<String, Value>, expected: &Revision) -> bool {
        self.hash_fields(fields) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }

    fn start(&self) -> blake3::Hasher {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn fields(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn hash_is_deterministic() {
        let data = fields(json!({"title": "a", "done": false}));
        assert_eq!(
            RevisionHasher::REVISION.hash_fields(&data),
            RevisionHasher::REVISION.hash_fields(&data)
        );
    }

    #[test]
    fn key_order_does_not_matter() {
        let mut a = Map::new();
        a.insert("x".into(), json!(1));
        a.insert("y".into(), json!("two"));
        let mut b = Map::new();
        b.insert("y".into(), json!("two"));
        b.insert("x".into(), json!(1));
        assert_eq!(
            RevisionHasher::REVISION.hash_fields(&a),
            RevisionHasher::REVISION.hash_fields(&b)
        );
    }

    #[test]
    fn type_changes_produce_different_revisions() {
        let h = RevisionHasher::REVISION;
        let variants = [
            json!({"v": 1}),
            json!({"v": 1.0}),
            json!({"v": "1"}),
            json!({"v": true}),
            json!({"v": null}),
            json!({"v": [1]}),
            json!({"v": {"1": 1}}),
        ];
        let revs: Vec<_> = variants.iter().map(|v| h.hash_value(v)).collect();
        for i in 0..revs.len() {
            for j in (i + 1)..revs.len() {
                assert_ne!(revs[i], revs[j], "{} vs {}", variants[i], variants[j]);
            }
        }
    }

    #[test]
    fn nested_boundaries_are_unambiguous() {
        let h = RevisionHasher::REVISION;
        assert_ne!(
            h.hash_value(&json!(["ab", "c"])),
            h.hash_value(&json!(["a", "bc"]))
        );
        assert_ne!(
            h.hash_value(&json!([[1], 2])),
            h.hash_value(&json!([1, [2]]))
        );
    }

    #[test]
    fn different_domains_produce_different_revisions() {
        let data = fields(json!({"k": "v"}));
        let custom = RevisionHasher::new("my-domain-v1");
        assert_ne!(
            RevisionHasher::REVISION.hash_fields(&data),
            custom.hash_fields(&data)
        );
        assert_eq!(custom.domain(), "my-domain-v1");
    }

    #[test]
    fn verify_detects_tampering() {
        let data = fields(json!({"amount": 10}));
        let rev = RevisionHasher::REVISION.hash_fields(&data);
        assert!(RevisionHasher::REVISION.verify(&data, &rev));
        let tampered = fields(json!({"amount": 11}));
        assert!(!RevisionHasher::REVISION.verify(&tampered, &rev));
    }

    #[test]
    fn serializable_matches_value_hash() {
        #[derive(serde::Serialize)]
        struct Note {
            title: String,
            pinned: bool,
        }
        let note = Note {
            title: "hi".into(),
            pinned: true,
        };
        let h = RevisionHasher::REVISION;
        assert_eq!(
            h.hash_serializable(&note).unwrap(),
            h.hash_value(&json!({"pinned": true, "title": "hi"}))
        );
    }

    proptest! {
        #[test]
        fn insertion_order_never_changes_revision(
            entries in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..16)
        ) {
            let forward: Map<String, Value> =
                entries.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let reverse: Map<String, Value> =
                entries.iter().rev().map(|(k, v)| (k.clone(), json!(v))).collect();
            prop_assert_eq!(
                RevisionHasher::REVISION.hash_fields(&forward),
                RevisionHasher::REVISION.hash_fields(&reverse)
            );
        }

        #[test]
        fn distinct_strings_distinct_revisions(a in ".{0,32}", b in ".{0,32}") {
            prop_assume!(a != b);
            let h = RevisionHasher::REVISION;
            prop_assert_ne!(h.hash_value(&json!(a)), h.hash_value(&json!(b)));
        }
    }
}
