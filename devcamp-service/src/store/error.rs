//! Persistence failures
//!
//! Raised by the store and forwarded untouched through the query engine.
//! Three shapes are recognized by the failure classifier: duplicate keys,
//! identifier casts and validation. Everything else stays opaque.

use serde_json::{json, Value};
use thiserror::Error;

/// Failure raised by a [`Collection`](super::Collection)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// A write would duplicate a unique field
    ///
    /// `key_value` lists the conflicting fields in schema order.
    #[error("duplicate key error collection: {collection}")]
    DuplicateKey {
        /// Collection name
        collection: String,
        /// Conflicting field → value pairs
        key_value: Vec<(String, Value)>,
    },

    /// A value could not be converted to the field's stored type
    #[error("cast to {expected} failed for value '{value}' at path '{field}'")]
    Cast {
        /// Field path
        field: String,
        /// Offending value as received
        value: String,
        /// Target type name
        expected: &'static str,
    },

    /// A document failed schema validation
    #[error("{collection} validation failed: {}", .messages.join(", "))]
    Validation {
        /// Collection name
        collection: String,
        /// One message per failing field
        messages: Vec<String>,
    },

    /// Malformed predicate, sort or projection
    #[error("invalid query: {0}")]
    Query(String),
}

impl StoreError {
    /// Identifier cast failure
    pub fn cast(field: impl Into<String>, value: impl Into<String>, expected: &'static str) -> Self {
        Self::Cast {
            field: field.into(),
            value: value.into(),
            expected,
        }
    }

    /// Error type name as shown in verbose responses
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DuplicateKey { .. } => "DuplicateKeyError",
            Self::Cast { .. } => "CastError",
            Self::Validation { .. } => "ValidationError",
            Self::Query(_) => "QueryError",
        }
    }

    /// Structured payload for verbose responses
    pub fn details(&self) -> Value {
        match self {
            Self::DuplicateKey {
                collection,
                key_value,
            } => {
                let keys: serde_json::Map<String, Value> = key_value.iter().cloned().collect();
                json!({ "collection": collection, "keyValue": keys })
            }
            Self::Cast {
                field,
                value,
                expected,
            } => json!({ "path": field, "value": value, "kind": expected }),
            Self::Validation {
                collection,
                messages,
            } => json!({ "collection": collection, "errors": messages }),
            Self::Query(reason) => json!({ "reason": reason }),
        }
    }
}
