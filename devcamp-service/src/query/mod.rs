//! Query feature engine
//!
//! Turns request query parameters into filter, pagination, projection and
//! sort refinements on a lazy [`QueryHandle`].

mod extract;
pub mod features;
pub mod handle;
pub mod params;

pub use features::{
    filter_predicate, prefix_operators, FeatureDefaults, QueryFeatures, COMPARISON_OPERATORS,
    DEFAULT_FIELDS, DEFAULT_LIMIT, DEFAULT_PAGE, DEFAULT_SORT_BY, RESERVED_KEYS,
};
pub use handle::{Document, QueryHandle};
pub use params::{QueryParams, QueryValue, MAX_KEY_DEPTH};
