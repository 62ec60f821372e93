//! Lazy query handle trait
//!
//! A handle is an unexecuted, chainable query. Refinement calls mutate it in
//! place; [`QueryHandle::execute`] consumes it, which is the only point where
//! a backend is allowed to do I/O.
//!
//! Uses return-position `impl Trait` in traits, so backends don't need
//! `async_trait` or boxed futures.

use std::future::Future;

use serde_json::{Map, Value};

/// Filter predicate handed to [`QueryHandle::filter`]
///
/// Operator keys are already in their prefixed form (`$gt`, `$in`, ...).
pub type Document = Map<String, Value>;

/// An unexecuted, chainable database query
///
/// # Example
///
/// ```rust,ignore
/// let mut handle = bootcamps.find();
/// handle.sort("-createdAt").skip(10).limit(10);
/// let page = handle.execute().await?;
/// ```
pub trait QueryHandle: Send + Sized {
    /// Realized result set
    type Output: Send;

    /// Failure raised by the backend on execution
    type Error: Send;

    /// Add conditions to the query predicate
    fn filter(&mut self, predicate: Document) -> &mut Self;

    /// Set the sort expression (space separated keys, `-` for descending)
    fn sort(&mut self, expr: &str) -> &mut Self;

    /// Set the projection (space separated fields, `-` to exclude)
    fn select(&mut self, projection: &str) -> &mut Self;

    /// Skip the first `n` matching documents
    fn skip(&mut self, n: u64) -> &mut Self;

    /// Return at most `n` documents
    fn limit(&mut self, n: u64) -> &mut Self;

    /// Run the query
    fn execute(self) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;
}
