//! Query filters understood by every [`DataStore`](crate::DataStore).
//!
//! A [`Filter`] is a conjunction of field [`Condition`]s, an ordering, and a
//! `skip`/`limit` window. Stores apply them in that order: match, sort, then
//! page. When no ordering is given, documents are ordered by id so paging is
//! stable across calls.
//!
//! A [`Cursor`] restricts matches to documents sorting strictly after a
//! given position, for paging over collections that change between pages.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;

/// Comparison applied to one field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "op", content = "value")]
pub enum Op {
    Eq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    /// Field is absent or `null`.
    IsNull,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: Op,
}

impl Condition {
    pub fn matches(&self, doc: &Document) -> bool {
        let value = doc.field(&self.field);
        match (&self.op, value) {
            (Op::IsNull, v) => matches!(v, None | Some(Value::Null)),
            (_, None) => false,
            (Op::Eq(expected), Some(v)) => compare_values(&v, expected) == Ordering::Equal,
            (Op::Gt(bound), Some(v)) => compare_values(&v, bound) == Ordering::Greater,
            (Op::Gte(bound), Some(v)) => compare_values(&v, bound) != Ordering::Less,
            (Op::Lt(bound), Some(v)) => compare_values(&v, bound) == Ordering::Less,
            (Op::Lte(bound), Some(v)) => compare_values(&v, bound) != Ordering::Greater,
            (Op::In(set), Some(v)) => set
                .iter()
                .any(|candidate| compare_values(&v, candidate) == Ordering::Equal),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

/// Position in a filter's sort order: the ordered field values of a
/// document followed by its id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub values: Vec<Value>,
    pub id: String,
}

impl Cursor {
    pub fn new(values: Vec<Value>, id: impl Into<String>) -> Self {
        Self {
            values,
            id: id.into(),
        }
    }
}

/// Match, order, and page specification for a `find`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub order: Vec<Order>,
    /// Only documents sorting strictly after this position match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Cursor>,
    #[serde(default)]
    pub skip: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, op: Op) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op,
        });
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Op::Eq(value.into()))
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Op::Gt(value.into()))
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Op::Gte(value.into()))
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Op::Lte(value.into()))
    }

    pub fn is_in(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.with(field, Op::In(values))
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order.push(Order {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Start matching after `cursor` in this filter's order.
    pub fn after(mut self, cursor: Cursor) -> Self {
        self.after = Some(cursor);
        self
    }

    /// The cursor positioned at `doc` under this filter's order.
    pub fn cursor_for(&self, doc: &Document) -> Cursor {
        let values = self
            .order
            .iter()
            .map(|o| doc.field(&o.field).unwrap_or(Value::Null))
            .collect();
        Cursor::new(values, doc.id.clone())
    }

    /// A copy of this filter restricted to one page.
    pub fn paged(&self, skip: usize, limit: usize) -> Self {
        Self {
            skip,
            limit: Some(limit),
            ..self.clone()
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        let past_cursor = match &self.after {
            Some(cursor) => self.compare(&self.cursor_for(doc), cursor) == Ordering::Greater,
            None => true,
        };
        past_cursor && self.conditions.iter().all(|c| c.matches(doc))
    }

    /// Total ordering of two documents under this filter's `order`, falling
    /// back to id.
    pub fn compare_documents(&self, a: &Document, b: &Document) -> Ordering {
        self.compare(&self.cursor_for(a), &self.cursor_for(b))
    }

    fn compare(&self, a: &Cursor, b: &Cursor) -> Ordering {
        for (i, order) in self.order.iter().enumerate() {
            let lhs = a.values.get(i).unwrap_or(&Value::Null);
            let rhs = b.values.get(i).unwrap_or(&Value::Null);
            let ord = compare_values(lhs, rhs);
            let ord = match order.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id.cmp(&b.id)
    }

    /// Apply match, order, skip and limit to a set of documents.
    pub fn apply<'a, I>(&self, docs: I) -> Vec<Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut matched: Vec<&Document> = docs.into_iter().filter(|d| self.matches(d)).collect();
        matched.sort_by(|a, b| self.compare_documents(a, b));
        matched
            .into_iter()
            .skip(self.skip)
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: values of different types order by type
/// (null < bool < number < string < array < object); numbers compare
/// numerically.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => match (x.as_u64(), y.as_u64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => {
                    let x = x.as_f64().unwrap_or_default();
                    let y = y.as_f64().unwrap_or_default();
                    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
                }
            },
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, v: Value) -> Document {
        Document::with_id(id, &v).unwrap()
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn numeric_comparisons() {
        let d = doc("1", json!({"checkpoint": 5}));
        assert!(Filter::new().gt("checkpoint", 4).matches(&d));
        assert!(!Filter::new().gt("checkpoint", 5).matches(&d));
        assert!(Filter::new().gte("checkpoint", 5).matches(&d));
        assert!(Filter::new().lte("checkpoint", 5).matches(&d));
        assert!(Filter::new().eq("checkpoint", 5.0).matches(&d));
    }

    #[test]
    fn missing_field_only_matches_is_null() {
        let d = doc("1", json!({}));
        assert!(!Filter::new().eq("rev", "x").matches(&d));
        assert!(Filter::new().with("rev", Op::IsNull).matches(&d));
        let n = doc("2", json!({"rev": null}));
        assert!(Filter::new().with("rev", Op::IsNull).matches(&n));
    }

    #[test]
    fn in_matches_any() {
        let d = doc("b", json!({}));
        assert!(Filter::new().is_in("id", vec![json!("a"), json!("b")]).matches(&d));
        assert!(!Filter::new().is_in("id", vec![json!("c")]).matches(&d));
    }

    #[test]
    fn apply_orders_and_pages() {
        let docs = vec![
            doc("a", json!({"seq": 3})),
            doc("b", json!({"seq": 1})),
            doc("c", json!({"seq": 2})),
        ];
        let f = Filter::new().order_by("seq", Direction::Desc);
        assert_eq!(ids(&f.apply(&docs)), vec!["a", "c", "b"]);
        assert_eq!(ids(&f.paged(1, 1).apply(&docs)), vec!["c"]);
        assert_eq!(ids(&f.paged(2, 5).apply(&docs)), vec!["b"]);
    }

    #[test]
    fn default_order_is_by_id() {
        let docs = vec![doc("z", json!({})), doc("a", json!({})), doc("m", json!({}))];
        assert_eq!(ids(&Filter::new().apply(&docs)), vec!["a", "m", "z"]);
    }

    #[test]
    fn after_cursor_skips_to_position() {
        let docs = vec![
            doc("a", json!({"seq": 1})),
            doc("b", json!({"seq": 1})),
            doc("c", json!({"seq": 2})),
        ];
        let f = Filter::new().order_by("seq", Direction::Asc);
        let cursor = f.cursor_for(&docs[0]);
        assert_eq!(ids(&f.clone().after(cursor).apply(&docs)), vec!["b", "c"]);

        let f = f.after(Cursor::new(vec![json!(1)], "b")).limit(5);
        assert_eq!(ids(&f.apply(&docs)), vec!["c"]);
    }

    #[test]
    fn after_cursor_is_stable_when_earlier_rows_move() {
        let mut docs = vec![
            doc("a", json!({"seq": 1})),
            doc("b", json!({"seq": 1})),
            doc("c", json!({"seq": 1})),
        ];
        let f = Filter::new().lte("seq", 1).order_by("seq", Direction::Asc);
        let first = f.paged(0, 2).apply(&docs);
        let cursor = f.cursor_for(&first[1]);
        docs[0] = doc("a", json!({"seq": 5}));
        assert_eq!(ids(&f.paged(2, 2).apply(&docs)), Vec::<&str>::new());
        assert_eq!(ids(&f.clone().after(cursor).limit(2).apply(&docs)), vec!["c"]);
    }

    #[test]
    fn value_order_ranks_types() {
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(10), &json!("1")), Ordering::Less);
        assert_eq!(compare_values(&json!(10), &json!(9)), Ordering::Greater);
        assert_eq!(compare_values(&json!(1.5), &json!(1)), Ordering::Greater);
    }

    #[test]
    fn filter_serde_roundtrip() {
        let f = Filter::new()
            .gt("checkpoint", 3)
            .order_by("checkpoint", Direction::Asc)
            .paged(10, 5);
        let json = serde_json::to_string(&f).unwrap();
        let back: Filter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}
