//! Canonical, type-tagged byte encoding of JSON values.
//!
//! Every value is written as a one-byte tag followed by a fixed-width or
//! length-prefixed body. Object keys are sorted before encoding, so two maps
//! holding the same entries encode identically whatever their insertion
//! order or the `serde_json` map backend in use.

use serde_json::{Map, Number, Value};

const TAG_NULL: u8 = b'n';
const TAG_TRUE: u8 = b't';
const TAG_FALSE: u8 = b'f';
const TAG_I64: u8 = b'i';
const TAG_U64: u8 = b'u';
const TAG_F64: u8 = b'd';
const TAG_STRING: u8 = b's';
const TAG_ARRAY: u8 = b'a';
const TAG_OBJECT: u8 = b'o';

/// Streams the canonical encoding of a value into a BLAKE3 hasher.
pub struct CanonicalEncoder<'a> {
    out: &'a mut blake3::Hasher,
}

impl<'a> CanonicalEncoder<'a> {
    pub fn new(out: &'a mut blake3::Hasher) -> Self {
        Self { out }
    }

    pub fn encode(&mut self, value: &Value) {
        match value {
            Value::Null => self.tag(TAG_NULL),
            Value::Bool(true) => self.tag(TAG_TRUE),
            Value::Bool(false) => self.tag(TAG_FALSE),
            Value::Number(n) => self.encode_number(n),
            Value::String(s) => {
                self.tag(TAG_STRING);
                self.bytes(s.as_bytes());
            }
            Value::Array(items) => {
                self.tag(TAG_ARRAY);
                self.len(items.len());
                for item in items {
                    self.encode(item);
                }
            }
            Value::Object(map) => self.encode_object(map),
        }
    }

    pub fn encode_object(&mut self, map: &Map<String, Value>) {
        let mut entries: Vec<(&String, &Value)> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        self.tag(TAG_OBJECT);
        self.len(entries.len());
        for (key, value) in entries {
            self.bytes(key.as_bytes());
            self.encode(value);
        }
    }

    fn encode_number(&mut self, n: &Number) {
        if let Some(i) = n.as_i64() {
            self.tag(TAG_I64);
            self.out.update(&i.to_be_bytes());
        } else if let Some(u) = n.as_u64() {
            self.tag(TAG_U64);
            self.out.update(&u.to_be_bytes());
        } else {
            // Non-finite floats are not representable in serde_json.
            let f = n.as_f64().unwrap_or_default();
            self.tag(TAG_F64);
            self.out.update(&f.to_bits().to_be_bytes());
        }
    }

    fn tag(&mut self, tag: u8) {
        self.out.update(&[tag]);
    }

    fn len(&mut self, len: usize) {
        self.out.update(&(len as u64).to_be_bytes());
    }

    fn bytes(&mut self, data: &[u8]) {
        self.len(data.len());
        self.out.update(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn digest(value: &Value) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        CanonicalEncoder::new(&mut hasher).encode(value);
        *hasher.finalize().as_bytes()
    }

    #[test]
    fn integer_and_float_differ() {
        assert_ne!(digest(&json!(2)), digest(&json!(2.0)));
    }

    #[test]
    fn large_unsigned_is_stable() {
        let v = json!(u64::MAX);
        assert_eq!(digest(&v), digest(&v));
        assert_ne!(digest(&v), digest(&json!(-1)));
    }

    #[test]
    fn empty_containers_differ() {
        assert_ne!(digest(&json!([])), digest(&json!({})));
        assert_ne!(digest(&json!("")), digest(&json!([])));
    }

    #[test]
    fn object_key_value_boundary() {
        assert_ne!(digest(&json!({"ab": "c"})), digest(&json!({"a": "bc"})));
    }
}
