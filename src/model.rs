//! Documents, references and the query algebra shared by the remote and local paths.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;

/// Field mapping of a document, excluding its identifier.
pub type Fields = serde_json::Map<String, Value>;

/// Name of the identifier key in the serialized form of a [`Document`].
pub const ID_FIELD: &str = "id";

/// A stored record: a system-assigned identifier plus its fields.
///
/// Serialized flat, as `{"id": ..., <fields>...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Document {
    /// Builds a document, dropping any `id` key found in `fields`.
    pub fn new(id: impl Into<String>, mut fields: Fields) -> Self {
        fields.remove(ID_FIELD);
        Self { id: id.into(), fields }
    }

    /// Builds a document from a JSON object literal. Non-object values yield no fields.
    pub fn from_json(id: impl Into<String>, value: Value) -> Self {
        match value {
            Value::Object(map) => Self::new(id, map),
            _ => Self::new(id, Fields::new()),
        }
    }

    /// Shallow-merges `patch` into the fields. The identifier is never overwritten.
    pub fn merge(&mut self, patch: Fields) {
        for (key, value) in patch {
            if key != ID_FIELD {
                self.fields.insert(key, value);
            }
        }
    }
}

/// Read-only view of a document returned by a query.
///
/// Snapshots are copies: later writes to the store do not show through.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    id: String,
    data: Fields,
}

impl DocumentSnapshot {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &Fields {
        &self.data
    }

    /// Returns a single field, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn into_data(self) -> Fields {
        self.data
    }
}

impl From<Document> for DocumentSnapshot {
    fn from(doc: Document) -> Self {
        Self { id: doc.id, data: doc.fields }
    }
}

/// Reference to a named collection. Constructing one performs no validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    name: String,
}

impl CollectionRef {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Reference to a single document within a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocRef {
    collection: String,
    id: String,
}

impl DocRef {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Sort direction of an ordering clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(Error::Internal(format!("unknown sort direction: {}", other))),
        }
    }
}

/// Bound operator of a range clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeOp {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

/// Operator accepted by [`filter`]. `Eq` produces an equality clause, the rest range clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl FromStr for FilterOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" => Ok(FilterOp::Eq),
            "<" => Ok(FilterOp::Lt),
            "<=" => Ok(FilterOp::Le),
            ">" => Ok(FilterOp::Gt),
            ">=" => Ok(FilterOp::Ge),
            other => Err(Error::Internal(format!("unsupported filter operator: {}", other))),
        }
    }
}

/// One piece of a query prior to execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Clause {
    Equality { field: String, value: Value },
    Range { field: String, op: RangeOp, value: Value },
    OrderBy { field: String, direction: Direction },
}

/// Immutable query descriptor: target collection plus ordering and filter clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    collection: String,
    #[serde(default)]
    clauses: Vec<Clause>,
}

impl Query {
    /// A query with no clauses: every document, in collection order.
    pub fn new(collection_ref: &CollectionRef) -> Self {
        Self {
            collection: collection_ref.name.clone(),
            clauses: Vec::new(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
}

/// Remote store timestamp, stored in documents as `{"seconds": .., "nanoseconds": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanoseconds: u32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanoseconds: u32) -> Self {
        Self { seconds, nanoseconds }
    }

    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self::new(now.timestamp(), now.timestamp_subsec_nanos())
    }

    /// Recognizes the timestamp shape inside a document value.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.len() != 2 {
            return None;
        }
        let seconds = obj.get("seconds")?.as_i64()?;
        let nanoseconds = u32::try_from(obj.get("nanoseconds")?.as_u64()?).ok()?;
        Some(Self::new(seconds, nanoseconds))
    }
}

impl From<Timestamp> for Value {
    fn from(ts: Timestamp) -> Self {
        serde_json::json!({ "seconds": ts.seconds, "nanoseconds": ts.nanoseconds })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match chrono::DateTime::from_timestamp(self.seconds, self.nanoseconds) {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}.{:09}", self.seconds, self.nanoseconds),
        }
    }
}

/// Returns a reference to the named collection.
pub fn collection(name: impl Into<String>) -> CollectionRef {
    CollectionRef { name: name.into() }
}

/// Returns a reference to document `id` in collection `collection_name`.
pub fn doc(collection_name: impl Into<String>, id: impl Into<String>) -> DocRef {
    DocRef {
        collection: collection_name.into(),
        id: id.into(),
    }
}

/// Builds a query over `collection_ref` from the given clauses.
pub fn query(collection_ref: &CollectionRef, clauses: impl IntoIterator<Item = Clause>) -> Query {
    Query {
        collection: collection_ref.name.clone(),
        clauses: clauses.into_iter().collect(),
    }
}

/// Ordering clause on `field`.
pub fn order_by(field: impl Into<String>, direction: Direction) -> Clause {
    Clause::OrderBy {
        field: field.into(),
        direction,
    }
}

/// Filter clause on `field`; the counterpart of the remote API's `where`.
pub fn filter(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Clause {
    let field = field.into();
    let value = value.into();
    let op = match op {
        FilterOp::Eq => return Clause::Equality { field, value },
        FilterOp::Lt => RangeOp::Lt,
        FilterOp::Le => RangeOp::Le,
        FilterOp::Gt => RangeOp::Gt,
        FilterOp::Ge => RangeOp::Ge,
    };
    Clause::Range { field, op, value }
}
