//! Document persistence
//!
//! An in-memory document store implementing [`QueryHandle`](crate::query::QueryHandle),
//! with the failure shapes the classifier knows how to rewrite.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::{
    Collection, CollectionSchema, MemoryQuery, CREATED_AT_FIELD, ID_FIELD, VERSION_FIELD,
};
