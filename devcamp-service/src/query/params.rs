//! Request query parameters as a closed, arbitrarily nested sum type
//!
//! HTTP query strings arrive as flat `(key, value)` pairs. List endpoints
//! accept bracket notation so clients can express nested filters:
//!
//! ```rust
//! use devcamp_service::query::{QueryParams, QueryValue};
//!
//! let params = QueryParams::from_pairs(vec![
//!     ("averageCost[lte]".to_string(), "10000".to_string()),
//!     ("careers[]".to_string(), "Business".to_string()),
//!     ("sort".to_string(), "name,-averageCost".to_string()),
//! ]);
//!
//! assert_eq!(
//!     params.get("averageCost"),
//!     Some(&QueryValue::mapping([("lte", QueryValue::from("10000"))])),
//! );
//! assert_eq!(params.get("sort").and_then(QueryValue::as_str), Some("name,-averageCost"));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Deepest bracket nesting decoded from a key; the rest stays a literal key
pub const MAX_KEY_DEPTH: usize = 16;

/// A single query parameter value
///
/// Closed on purpose: stages pattern-match these four shapes instead of
/// relying on loose truthiness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// Literal text, the only shape a raw query string produces at a leaf
    String(String),
    /// Numeric literal (from JSON-sourced parameters)
    Number(Number),
    /// Repeated key or `key[]` notation
    Sequence(Vec<QueryValue>),
    /// `key[sub]` notation
    Mapping(BTreeMap<String, QueryValue>),
}

impl QueryValue {
    /// Build a mapping from key/value pairs
    pub fn mapping<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, QueryValue)>,
    {
        Self::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// The text if this is a `String`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert into the JSON shape handed to the persistence layer
    pub fn into_json(self) -> Value {
        match self {
            Self::String(s) => Value::String(s),
            Self::Number(n) => Value::Number(n),
            Self::Sequence(items) => Value::Array(items.into_iter().map(Self::into_json).collect()),
            Self::Mapping(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<Vec<QueryValue>> for QueryValue {
    fn from(value: Vec<QueryValue>) -> Self {
        Self::Sequence(value)
    }
}

/// All query parameters of one request
///
/// Read-only input to a single pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, QueryValue>);

impl QueryParams {
    /// Create an empty parameter set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode flat, already percent-decoded query pairs using bracket notation
    ///
    /// Repeated keys and conflicting shapes are merged (see [`merge`]).
    /// Key segments starting with `$` are dropped so operator syntax can only
    /// ever be produced by the filter stage.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = BTreeMap::new();

        for (key, value) in pairs {
            let Some((root, segments)) = split_key(key.as_ref()) else {
                continue;
            };

            if root.starts_with('$') || segments.iter().any(|s| s.starts_with('$')) {
                tracing::debug!(key = key.as_ref(), "dropping operator-like query key");
                continue;
            }

            let leaf = nest(&segments, QueryValue::String(value.into()));
            let merged = merge(params.remove(root.as_str()), leaf);
            params.insert(root, merged);
        }

        Self(params)
    }

    /// Insert or replace a parameter
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Look up a top-level parameter
    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.0.get(key)
    }

    /// Whether there are no parameters at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over top-level parameters in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &QueryValue)> {
        self.0.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, QueryValue)> for QueryParams {
    fn from_iter<T: IntoIterator<Item = (K, QueryValue)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Split `a[b][]` into `("a", ["b", ""])`
///
/// Returns `None` for an empty key. A key whose brackets don't close is taken
/// literally. Past [`MAX_KEY_DEPTH`] segments the remaining suffix becomes one
/// final literal segment.
fn split_key(key: &str) -> Option<(String, Vec<String>)> {
    let Some(open) = key.find('[') else {
        return (!key.is_empty()).then(|| (key.to_string(), Vec::new()));
    };
    if open == 0 {
        return Some((key.to_string(), Vec::new()));
    }

    let root = key[..open].to_string();
    let mut segments = Vec::new();
    let mut rest = &key[open..];

    while let Some(inner) = rest.strip_prefix('[') {
        if segments.len() == MAX_KEY_DEPTH {
            segments.push(rest.to_string());
            return Some((root, segments));
        }
        let Some(close) = inner.find(']') else {
            return Some((key.to_string(), Vec::new()));
        };
        segments.push(inner[..close].to_string());
        rest = &inner[close + 1..];
    }

    if !rest.is_empty() {
        // trailing garbage after the last bracket
        return Some((key.to_string(), Vec::new()));
    }

    Some((root, segments))
}

/// Wrap `leaf` in the shape described by `segments`, innermost last
fn nest(segments: &[String], leaf: QueryValue) -> QueryValue {
    segments.iter().rev().fold(leaf, |inner, segment| {
        if segment.is_empty() {
            QueryValue::Sequence(vec![inner])
        } else {
            QueryValue::mapping([(segment.clone(), inner)])
        }
    })
}

/// Combine an existing slot with an incoming value
///
/// Mappings merge key-wise (recursively), sequences concatenate, and any
/// other combination collapses into a sequence in arrival order.
pub(crate) fn merge(existing: Option<QueryValue>, incoming: QueryValue) -> QueryValue {
    match (existing, incoming) {
        (None, incoming) => incoming,
        (Some(QueryValue::Mapping(mut current)), QueryValue::Mapping(extra)) => {
            for (key, value) in extra {
                let merged = merge(current.remove(&key), value);
                current.insert(key, merged);
            }
            QueryValue::Mapping(current)
        }
        (Some(QueryValue::Sequence(mut current)), QueryValue::Sequence(extra)) => {
            current.extend(extra);
            QueryValue::Sequence(current)
        }
        (Some(QueryValue::Sequence(mut current)), other) => {
            current.push(other);
            QueryValue::Sequence(current)
        }
        (Some(first), QueryValue::Sequence(extra)) => {
            let mut items = Vec::with_capacity(extra.len() + 1);
            items.push(first);
            items.extend(extra);
            QueryValue::Sequence(items)
        }
        (Some(first), second) => QueryValue::Sequence(vec![first, second]),
    }
}
