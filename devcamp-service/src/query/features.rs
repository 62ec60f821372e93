//! Query feature engine for list endpoints
//!
//! Wraps a [`QueryHandle`] together with the request's [`QueryParams`] and
//! refines the handle in four orthogonal stages:
//!
//! - **Filtering**: every non-reserved parameter becomes a predicate field;
//!   comparison operators (`gt`, `lt`, `gte`, `lte`, `in`) are prefixed with
//!   `$` at any depth.
//! - **Pagination**: `page` / `limit`, defaulting to page 1 of 10.
//! - **Projection**: `fields`, commas turned into spaces, default `-__v`.
//! - **Sorting**: `sort`, commas turned into spaces, default `-createdAt`.
//!
//! No stage does I/O; the handle is only run by [`QueryFeatures::execute`].
//!
//! # Example
//!
//! ```rust,ignore
//! use devcamp_service::query::{QueryFeatures, QueryParams};
//!
//! let bootcamps = QueryFeatures::new(state.bootcamps().find(), &params)
//!     .add_all_features()
//!     .execute()
//!     .await?;
//! ```

use std::collections::BTreeMap;

use super::handle::{Document, QueryHandle};
use super::params::{QueryParams, QueryValue};

/// Parameters consumed by their own stage and never used as filter fields
pub const RESERVED_KEYS: [&str; 4] = ["sort", "fields", "limit", "page"];

/// Keys rewritten to their `$`-prefixed form by the filter stage
pub const COMPARISON_OPERATORS: [&str; 5] = ["gt", "lt", "gte", "lte", "in"];

/// Default sort: newest first
pub const DEFAULT_SORT_BY: &str = "-createdAt";

/// Default projection: hide the internal revision field
pub const DEFAULT_FIELDS: &str = "-__v";

/// Default page size
pub const DEFAULT_LIMIT: u64 = 10;

/// Default page (1-indexed)
pub const DEFAULT_PAGE: u64 = 1;

/// Fallbacks used when a request omits or garbles a feature parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureDefaults {
    /// Sort expression
    pub sort_by: String,
    /// Projection expression
    pub fields: String,
    /// Page size
    pub limit: u64,
    /// Page number
    pub page: u64,
    /// Optional cap on the page size. `None` leaves `limit` unbounded.
    pub max_limit: Option<u64>,
}

impl Default for FeatureDefaults {
    fn default() -> Self {
        Self {
            sort_by: DEFAULT_SORT_BY.to_string(),
            fields: DEFAULT_FIELDS.to_string(),
            limit: DEFAULT_LIMIT,
            page: DEFAULT_PAGE,
            max_limit: None,
        }
    }
}

/// Per-request pipeline over a lazy query handle
///
/// Owns the handle exclusively and is consumed by [`execute`](Self::execute).
/// Stages don't guard against repetition: calling one twice applies it twice.
#[derive(Debug)]
pub struct QueryFeatures<'p, H> {
    handle: H,
    params: &'p QueryParams,
    defaults: FeatureDefaults,
}

impl<'p, H: QueryHandle> QueryFeatures<'p, H> {
    /// Wrap a handle and the raw request parameters
    pub fn new(handle: H, params: &'p QueryParams) -> Self {
        Self {
            handle,
            params,
            defaults: FeatureDefaults::default(),
        }
    }

    /// Replace the defaults used by the argument-less stage methods
    #[must_use]
    pub fn with_defaults(mut self, defaults: FeatureDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Apply every non-reserved parameter as a filter condition
    #[must_use]
    pub fn add_filtering(mut self) -> Self {
        let predicate = filter_predicate(self.params);
        tracing::trace!(fields = predicate.len(), "applying filter");
        self.handle.filter(predicate);
        self
    }

    /// Apply `page` / `limit` with the configured defaults
    #[must_use]
    pub fn add_pagination(self) -> Self {
        let (limit, page) = (self.defaults.limit, self.defaults.page);
        self.add_pagination_with(limit, page)
    }

    /// Apply `page` / `limit`, falling back to the given defaults
    #[must_use]
    pub fn add_pagination_with(mut self, default_limit: u64, default_page: u64) -> Self {
        let mut limit = positive_integer(self.params.get("limit")).unwrap_or(default_limit);
        let page = positive_integer(self.params.get("page")).unwrap_or(default_page);

        if let Some(max) = self.defaults.max_limit {
            if limit > max {
                tracing::debug!(requested = limit, max, "clamping page size");
                limit = max;
            }
        }

        let documents_to_skip = page.saturating_sub(1).saturating_mul(limit);
        tracing::trace!(page, limit, skip = documents_to_skip, "applying pagination");

        self.handle.skip(documents_to_skip).limit(limit);
        self
    }

    /// Apply `fields` with the configured default projection
    #[must_use]
    pub fn add_projection(self) -> Self {
        let fields = self.defaults.fields.clone();
        self.add_projection_with(&fields)
    }

    /// Apply `fields`, falling back to `default_fields`
    #[must_use]
    pub fn add_projection_with(mut self, default_fields: &str) -> Self {
        let fields = space_separated(self.params.get("fields"))
            .unwrap_or_else(|| default_fields.to_string());
        tracing::trace!(%fields, "applying projection");
        self.handle.select(&fields);
        self
    }

    /// Apply `sort` with the configured default sort
    #[must_use]
    pub fn add_sorting(self) -> Self {
        let sort_by = self.defaults.sort_by.clone();
        self.add_sorting_with(&sort_by)
    }

    /// Apply `sort`, falling back to `default_sort_by`
    #[must_use]
    pub fn add_sorting_with(mut self, default_sort_by: &str) -> Self {
        let sort_by = space_separated(self.params.get("sort"))
            .unwrap_or_else(|| default_sort_by.to_string());
        tracing::trace!(%sort_by, "applying sort");
        self.handle.sort(&sort_by);
        self
    }

    /// Filtering, pagination, projection and sorting, in that order
    #[must_use]
    pub fn add_all_features(self) -> Self {
        self.add_filtering()
            .add_pagination()
            .add_projection()
            .add_sorting()
    }

    /// Run the refined query
    ///
    /// Backend failures come back exactly as the handle raised them.
    pub async fn execute(self) -> Result<H::Output, H::Error> {
        self.handle.execute().await
    }

    /// The refined handle, without running it
    pub fn into_handle(self) -> H {
        self.handle
    }

    /// Borrow the handle
    pub fn handle(&self) -> &H {
        &self.handle
    }
}

/// Build the filter predicate for a parameter set
///
/// Reserved keys are removed at the top level, then operator keys are
/// prefixed at every depth. All other keys and every value pass through
/// untouched: no type coercion happens here.
pub fn filter_predicate(params: &QueryParams) -> Document {
    params
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| {
            (
                operator_key(key.clone()),
                prefix_operators(value.clone()).into_json(),
            )
        })
        .collect()
}

/// Recursively rewrite operator keys inside mappings and sequences
pub fn prefix_operators(value: QueryValue) -> QueryValue {
    match value {
        QueryValue::Sequence(items) => {
            QueryValue::Sequence(items.into_iter().map(prefix_operators).collect())
        }
        QueryValue::Mapping(map) => QueryValue::Mapping(
            map.into_iter()
                .map(|(key, inner)| (operator_key(key), prefix_operators(inner)))
                .collect::<BTreeMap<_, _>>(),
        ),
        scalar @ (QueryValue::String(_) | QueryValue::Number(_)) => scalar,
    }
}

fn operator_key(key: String) -> String {
    if COMPARISON_OPERATORS.contains(&key.as_str()) {
        format!("${key}")
    } else {
        key
    }
}

/// `"a,b"` → `"a b"`; anything but a non-empty string yields `None`
fn space_separated(value: Option<&QueryValue>) -> Option<String> {
    match value {
        Some(QueryValue::String(raw)) if !raw.is_empty() => Some(raw.replace(',', " ")),
        _ => None,
    }
}

/// Positive integer from a string or number; everything else yields `None`
///
/// Strings accept the usual numeric spellings as long as they denote a whole
/// number: `"20"`, `" 20 "`, `"+20"`, `"2e1"`, `"20.0"`, `"0x14"`, `"0o24"`,
/// `"0b10100"`.
fn positive_integer(value: Option<&QueryValue>) -> Option<u64> {
    let parsed = match value? {
        QueryValue::String(raw) => parse_whole_number(raw.trim()),
        QueryValue::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole)),
        QueryValue::Sequence(_) | QueryValue::Mapping(_) => None,
    };
    parsed.filter(|n| *n > 0)
}

fn parse_whole_number(raw: &str) -> Option<u64> {
    if let Ok(n) = raw.parse::<u64>() {
        return Some(n);
    }

    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        let digits = raw
            .strip_prefix(prefix)
            .or_else(|| raw.strip_prefix(prefix.to_ascii_uppercase().as_str()));
        if let Some(digits) = digits {
            return u64::from_str_radix(digits, radix).ok();
        }
    }

    // f64 parsing also takes "inf" and "nan"
    if raw.bytes().any(|b| b.is_ascii_alphabetic() && !matches!(b, b'e' | b'E')) {
        return None;
    }
    raw.parse::<f64>().ok().and_then(whole)
}

fn whole(n: f64) -> Option<u64> {
    (n.is_finite() && n.fract() == 0.0 && n >= 1.0).then(|| n as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Filter(Document),
        Sort(String),
        Select(String),
        Skip(u64),
        Limit(u64),
    }

    /// Handle that records every refinement and returns the log on execute
    #[derive(Debug, Default)]
    struct RecordingHandle {
        calls: Vec<Call>,
        fail_with: Option<&'static str>,
    }

    impl QueryHandle for RecordingHandle {
        type Output = Vec<Call>;
        type Error = &'static str;

        fn filter(&mut self, predicate: Document) -> &mut Self {
            self.calls.push(Call::Filter(predicate));
            self
        }

        fn sort(&mut self, expr: &str) -> &mut Self {
            self.calls.push(Call::Sort(expr.to_string()));
            self
        }

        fn select(&mut self, projection: &str) -> &mut Self {
            self.calls.push(Call::Select(projection.to_string()));
            self
        }

        fn skip(&mut self, n: u64) -> &mut Self {
            self.calls.push(Call::Skip(n));
            self
        }

        fn limit(&mut self, n: u64) -> &mut Self {
            self.calls.push(Call::Limit(n));
            self
        }

        async fn execute(self) -> Result<Self::Output, Self::Error> {
            match self.fail_with {
                Some(err) => Err(err),
                None => Ok(self.calls),
            }
        }
    }

    fn params(value: serde_json::Value) -> QueryParams {
        serde_json::from_value(value).unwrap()
    }

    fn calls<'p>(features: QueryFeatures<'p, RecordingHandle>) -> Vec<Call> {
        features.into_handle().calls
    }

    fn filter_of(query: serde_json::Value) -> serde_json::Value {
        let params = params(query);
        serde_json::Value::Object(filter_predicate(&params))
    }

    #[test]
    fn test_filter_removes_reserved_keys() {
        let predicate = filter_of(json!({
            "sort": "-name",
            "fields": "-createdAt,-__v",
            "limit": "5",
            "page": "1",
        }));
        assert_eq!(predicate, json!({}));
    }

    #[test]
    fn test_filter_keeps_other_keys_byte_identical() {
        let predicate = filter_of(json!({
            "name": "Devworks Bootcamp",
            "housing": "true",
            "averageCost": 10000,
            "sorted": "x",
            "inner": "y",
        }));
        assert_eq!(
            predicate,
            json!({
                "name": "Devworks Bootcamp",
                "housing": "true",
                "averageCost": 10000,
                "sorted": "x",
                "inner": "y",
            })
        );
    }

    #[test]
    fn test_filter_prefixes_every_operator() {
        let predicate = filter_of(json!({
            "a": { "gt": "5000" },
            "b": { "gte": "5000" },
            "c": { "lt": "5000" },
            "d": { "lte": "5000" },
            "e": { "in": ["x", "y"] },
        }));
        assert_eq!(
            predicate,
            json!({
                "a": { "$gt": "5000" },
                "b": { "$gte": "5000" },
                "c": { "$lt": "5000" },
                "d": { "$lte": "5000" },
                "e": { "$in": ["x", "y"] },
            })
        );
    }

    #[test]
    fn test_filter_prefixes_operators_at_any_depth() {
        let predicate = filter_of(json!({
            "location": {
                "geo": [
                    { "lte": "1", "other": { "gt": "2", "gtx": "3" } },
                    "in",
                ],
            },
            "gt": { "in": { "lt": "4" } },
        }));
        assert_eq!(
            predicate,
            json!({
                "location": {
                    "geo": [
                        { "$lte": "1", "other": { "$gt": "2", "gtx": "3" } },
                        "in",
                    ],
                },
                "$gt": { "$in": { "$lt": "4" } },
            })
        );
    }

    #[test]
    fn test_filter_only_rewrites_exact_matches() {
        let predicate = filter_of(json!({
            "price": { "GT": "1", "gt_": "2", "lte2": "3", "inside": "4" },
        }));
        assert_eq!(
            predicate,
            json!({ "price": { "GT": "1", "gt_": "2", "lte2": "3", "inside": "4" } })
        );
    }

    #[test]
    fn test_filter_reserved_keys_only_removed_at_top_level() {
        let predicate = filter_of(json!({
            "meta": { "sort": "a", "page": "2" },
            "page": "3",
        }));
        assert_eq!(predicate, json!({ "meta": { "sort": "a", "page": "2" } }));
    }

    #[test]
    fn test_filter_does_not_coerce_values() {
        let predicate = filter_of(json!({ "weeks": "8", "tuition": 9000 }));
        assert_eq!(predicate["weeks"], json!("8"));
        assert_eq!(predicate["tuition"], json!(9000));
    }

    #[test]
    fn test_filter_deep_structure() {
        let mut value = QueryValue::mapping([("lt", QueryValue::from("1"))]);
        for _ in 0..64 {
            value = QueryValue::mapping([("in", value)]);
        }
        let mut expected = json!({ "$lt": "1" });
        for _ in 0..64 {
            expected = json!({ "$in": expected });
        }

        let params: QueryParams = [("deep", value)].into_iter().collect();
        assert_eq!(filter_predicate(&params)["deep"], expected);
    }

    #[test]
    fn test_add_filtering_passes_predicate_to_handle() {
        let params = params(json!({ "careers": { "in": "Business" }, "limit": "3" }));
        let calls = calls(QueryFeatures::new(RecordingHandle::default(), &params).add_filtering());

        let expected = json!({ "careers": { "$in": "Business" } });
        assert_eq!(
            calls,
            vec![Call::Filter(expected.as_object().unwrap().clone())]
        );
    }

    #[test]
    fn test_sorting_rewrites_commas() {
        let params = params(json!({ "sort": "name,-price" }));
        let calls = calls(QueryFeatures::new(RecordingHandle::default(), &params).add_sorting());
        assert_eq!(calls, vec![Call::Sort("name -price".to_string())]);
    }

    #[test]
    fn test_sorting_defaults_when_absent() {
        let params = QueryParams::new();
        let calls = calls(QueryFeatures::new(RecordingHandle::default(), &params).add_sorting());
        assert_eq!(calls, vec![Call::Sort("-createdAt".to_string())]);
    }

    #[test]
    fn test_sorting_defaults_for_non_string_values() {
        for sort in [json!(["name", "-price"]), json!({ "a": "b" }), json!(5), json!("")] {
            let params = params(json!({ "sort": sort }));
            let calls =
                calls(QueryFeatures::new(RecordingHandle::default(), &params).add_sorting());
            assert_eq!(calls, vec![Call::Sort("-createdAt".to_string())]);
        }
    }

    #[test]
    fn test_sorting_with_explicit_default() {
        let params = QueryParams::new();
        let calls = calls(
            QueryFeatures::new(RecordingHandle::default(), &params).add_sorting_with("title"),
        );
        assert_eq!(calls, vec![Call::Sort("title".to_string())]);
    }

    #[test]
    fn test_pagination_from_params() {
        let params = params(json!({ "page": "2", "limit": "5" }));
        let calls = calls(QueryFeatures::new(RecordingHandle::default(), &params).add_pagination());
        assert_eq!(calls, vec![Call::Skip(5), Call::Limit(5)]);
    }

    #[test]
    fn test_pagination_defaults() {
        let params = QueryParams::new();
        let calls = calls(QueryFeatures::new(RecordingHandle::default(), &params).add_pagination());
        assert_eq!(calls, vec![Call::Skip(0), Call::Limit(10)]);
    }

    #[test]
    fn test_pagination_falls_back_for_unusable_values() {
        for (page, limit) in [
            (json!([]), json!("abc")),
            (json!("0"), json!("0")),
            (json!("-2"), json!("-5")),
            (json!("1.5"), json!({ "gt": "1" })),
            (json!(""), json!(["5"])),
        ] {
            let params = params(json!({ "page": page, "limit": limit }));
            let calls =
                calls(QueryFeatures::new(RecordingHandle::default(), &params).add_pagination());
            assert_eq!(calls, vec![Call::Skip(0), Call::Limit(10)]);
        }
    }

    #[test]
    fn test_pagination_accepts_numbers_and_padding() {
        let params = params(json!({ "page": 3, "limit": " 20 " }));
        let calls = calls(QueryFeatures::new(RecordingHandle::default(), &params).add_pagination());
        assert_eq!(calls, vec![Call::Skip(40), Call::Limit(20)]);
    }

    #[test]
    fn test_pagination_accepts_whole_number_spellings() {
        for (limit, expected) in [
            (json!("1e2"), 100),
            (json!("0x10"), 16),
            (json!("0B11"), 3),
            (json!("5.0"), 5),
            (json!("+7"), 7),
            (json!(3.0), 3),
        ] {
            let params = params(json!({ "limit": limit }));
            let calls =
                calls(QueryFeatures::new(RecordingHandle::default(), &params).add_pagination());
            assert_eq!(calls, vec![Call::Skip(0), Call::Limit(expected)]);
        }
    }

    #[test]
    fn test_pagination_rejects_non_whole_spellings() {
        for limit in [json!("2.5"), json!("inf"), json!("NaN"), json!("0x"), json!("1e-1"), json!(0.5)] {
            let params = params(json!({ "limit": limit }));
            let calls =
                calls(QueryFeatures::new(RecordingHandle::default(), &params).add_pagination());
            assert_eq!(calls, vec![Call::Skip(0), Call::Limit(10)]);
        }
    }

    #[test]
    fn test_pagination_is_unbounded_by_default() {
        let params = params(json!({ "limit": "100000" }));
        let calls = calls(QueryFeatures::new(RecordingHandle::default(), &params).add_pagination());
        assert_eq!(calls, vec![Call::Skip(0), Call::Limit(100_000)]);
    }

    #[test]
    fn test_pagination_respects_max_limit() {
        let params = params(json!({ "limit": "500", "page": "3" }));
        let defaults = FeatureDefaults {
            max_limit: Some(100),
            ..FeatureDefaults::default()
        };
        let calls = calls(
            QueryFeatures::new(RecordingHandle::default(), &params)
                .with_defaults(defaults)
                .add_pagination(),
        );
        assert_eq!(calls, vec![Call::Skip(200), Call::Limit(100)]);
    }

    #[test]
    fn test_pagination_saturates_instead_of_overflowing() {
        let params = params(json!({ "page": u64::MAX.to_string(), "limit": "1000" }));
        let calls = calls(QueryFeatures::new(RecordingHandle::default(), &params).add_pagination());
        assert_eq!(calls, vec![Call::Skip(u64::MAX), Call::Limit(1000)]);
    }

    #[test]
    fn test_projection_rewrites_commas() {
        let params = params(json!({ "fields": "name,createdAt" }));
        let calls = calls(QueryFeatures::new(RecordingHandle::default(), &params).add_projection());
        assert_eq!(calls, vec![Call::Select("name createdAt".to_string())]);
    }

    #[test]
    fn test_projection_defaults() {
        for fields in [json!(null), json!(["name"]), json!("")] {
            let query = if fields.is_null() {
                json!({})
            } else {
                json!({ "fields": fields })
            };
            let params = params(query);
            let calls =
                calls(QueryFeatures::new(RecordingHandle::default(), &params).add_projection());
            assert_eq!(calls, vec![Call::Select("-__v".to_string())]);
        }
    }

    #[test]
    fn test_add_all_features_order_and_defaults() {
        let params = params(json!({ "name": "x" }));
        let calls =
            calls(QueryFeatures::new(RecordingHandle::default(), &params).add_all_features());

        assert_eq!(
            calls,
            vec![
                Call::Filter(json!({ "name": "x" }).as_object().unwrap().clone()),
                Call::Skip(0),
                Call::Limit(10),
                Call::Select("-__v".to_string()),
                Call::Sort("-createdAt".to_string()),
            ]
        );
    }

    #[test]
    fn test_add_all_features_uses_configured_defaults() {
        let params = QueryParams::new();
        let defaults = FeatureDefaults {
            sort_by: "title".to_string(),
            fields: "-__v -createdAt".to_string(),
            limit: 25,
            page: 2,
            max_limit: None,
        };
        let calls = calls(
            QueryFeatures::new(RecordingHandle::default(), &params)
                .with_defaults(defaults)
                .add_all_features(),
        );

        assert_eq!(
            &calls[1..],
            &[
                Call::Skip(25),
                Call::Limit(25),
                Call::Select("-__v -createdAt".to_string()),
                Call::Sort("title".to_string()),
            ]
        );
    }

    #[test]
    fn test_stage_applied_twice_is_recorded_twice() {
        let params = QueryParams::new();
        let calls = calls(
            QueryFeatures::new(RecordingHandle::default(), &params)
                .add_sorting()
                .add_sorting(),
        );
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test]
    async fn test_execute_returns_results() {
        let params = params(json!({ "sort": "name" }));
        let result = QueryFeatures::new(RecordingHandle::default(), &params)
            .add_sorting()
            .execute()
            .await;
        assert_eq!(result, Ok(vec![Call::Sort("name".to_string())]));
    }

    #[tokio::test]
    async fn test_execute_propagates_backend_failure_unchanged() {
        let params = QueryParams::new();
        let handle = RecordingHandle {
            calls: Vec::new(),
            fail_with: Some("connection reset"),
        };
        let result = QueryFeatures::new(handle, &params)
            .add_all_features()
            .execute()
            .await;
        assert_eq!(result, Err("connection reset"));
    }
}
