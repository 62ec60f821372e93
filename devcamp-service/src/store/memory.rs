//! In-memory document collections
//!
//! Documents are JSON objects held behind a `tokio` `RwLock`. Queries are
//! lazy: [`Collection::find`] hands out a [`MemoryQuery`] that only touches
//! the documents when executed.
//!
//! Predicate semantics follow a document database:
//!
//! - `{"field": value}` is equality; an array field matches when any element
//!   is equal.
//! - `{"field": {"$gt": v}}` and friends (`$gte`, `$lt`, `$lte`, `$in`)
//!   compare numbers numerically and strings lexicographically.
//! - Dotted keys (`location.city`) address nested fields.
//! - String operands are cast to the schema type of their field, so
//!   `averageCost[lte]=10000` compares numerically.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::StoreError;
use crate::query::{Document, QueryHandle};

/// Identifier field
pub const ID_FIELD: &str = "_id";

/// Revision field
pub const VERSION_FIELD: &str = "__v";

/// Creation timestamp field (epoch milliseconds)
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Field rules for a collection
///
/// # Example
///
/// ```rust
/// use devcamp_service::store::CollectionSchema;
///
/// let schema = CollectionSchema::new("bootcamps")
///     .required("name")
///     .unique("name")
///     .numeric("averageCost");
/// assert_eq!(schema.name(), "bootcamps");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSchema {
    name: String,
    unique: Vec<String>,
    required: Vec<String>,
    numeric: Vec<String>,
    boolean: Vec<String>,
}

impl CollectionSchema {
    /// Empty schema for a named collection
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Require a field on insert
    #[must_use]
    pub fn required(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    /// Reject inserts that duplicate this field's value
    #[must_use]
    pub fn unique(mut self, field: impl Into<String>) -> Self {
        self.unique.push(field.into());
        self
    }

    /// Cast string operands for this field to numbers
    #[must_use]
    pub fn numeric(mut self, field: impl Into<String>) -> Self {
        self.numeric.push(field.into());
        self
    }

    /// Cast string operands for this field to booleans
    #[must_use]
    pub fn boolean(mut self, field: impl Into<String>) -> Self {
        self.boolean.push(field.into());
        self
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema for bootcamps
    pub fn bootcamps() -> Self {
        Self::new("bootcamps")
            .required("name")
            .required("description")
            .required("email")
            .required("address")
            .required("careers")
            .unique("name")
            .numeric("averageRating")
            .numeric("averageCost")
            .numeric(CREATED_AT_FIELD)
            .boolean("housing")
            .boolean("jobAssistance")
            .boolean("jobGuarantee")
            .boolean("acceptGi")
    }

    /// Schema for courses
    pub fn courses() -> Self {
        Self::new("courses")
            .required("title")
            .required("description")
            .required("weeks")
            .required("tuition")
            .required("minimumSkill")
            .required("bootcamp")
            .numeric("weeks")
            .numeric("tuition")
            .numeric(CREATED_AT_FIELD)
            .boolean("scholarshipAvailable")
    }

    /// Cast a predicate operand to the field's type
    fn cast(&self, field: &str, value: &Value) -> Result<Value, StoreError> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| self.cast(field, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::String(raw) if field == ID_FIELD => Uuid::parse_str(raw)
                .map(|id| Value::String(id.to_string()))
                .map_err(|_| StoreError::cast(field, raw.as_str(), "uuid")),
            Value::String(raw) if self.numeric.iter().any(|f| f == field) => {
                let trimmed = raw.trim();
                trimmed
                    .parse::<i64>()
                    .map(Value::from)
                    .ok()
                    .or_else(|| {
                        trimmed
                            .parse::<f64>()
                            .ok()
                            .and_then(serde_json::Number::from_f64)
                            .map(Value::Number)
                    })
                    .ok_or_else(|| StoreError::cast(field, raw.as_str(), "number"))
            }
            Value::String(raw) if self.boolean.iter().any(|f| f == field) => match raw.as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(StoreError::cast(field, raw.as_str(), "boolean")),
            },
            other => Ok(other.clone()),
        }
    }

    fn is_typed(&self, field: &str) -> Option<&'static str> {
        if self.numeric.iter().any(|f| f == field) {
            Some("number")
        } else if self.boolean.iter().any(|f| f == field) {
            Some("boolean")
        } else {
            None
        }
    }

    /// Bring typed fields of an incoming document to their declared type
    ///
    /// Strings are cast like predicate operands. Values of any other wrong
    /// type are a cast failure. `null` is left for the required check.
    fn coerce(&self, document: &mut Document) -> Result<(), StoreError> {
        for (field, value) in document.iter_mut() {
            let Some(expected) = self.is_typed(field) else {
                continue;
            };
            *value = match (&*value, expected) {
                (Value::Null, _) | (Value::Number(_), "number") | (Value::Bool(_), "boolean") => {
                    continue
                }
                (Value::String(_), _) => self.cast(field, value)?,
                (other, expected) => {
                    return Err(StoreError::cast(field.as_str(), other.to_string(), expected))
                }
            };
        }
        Ok(())
    }

    /// `"<field> is required"` for each required field that is blank
    ///
    /// With `only_present`, fields missing from the document are skipped.
    fn missing_required(&self, document: &Document, only_present: bool) -> Vec<String> {
        self.required
            .iter()
            .filter(|field| !only_present || document.contains_key(field.as_str()))
            .filter(|field| is_blank(document.get(field.as_str())))
            .map(|field| format!("{field} is required"))
            .collect()
    }

    /// Unique fields of `document` already taken by a document other than `skip`
    fn conflicts(
        &self,
        document: &Document,
        existing: &[Document],
        skip: Option<usize>,
    ) -> Vec<(String, Value)> {
        self.unique
            .iter()
            .filter_map(|field| {
                let value = document.get(field.as_str())?;
                existing
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| Some(*index) != skip)
                    .any(|(_, other)| other.get(field.as_str()) == Some(value))
                    .then(|| (field.clone(), value.clone()))
            })
            .collect()
    }
}

/// Drop fields the store owns
fn strip_metadata(document: &mut Document) {
    for field in [ID_FIELD, CREATED_AT_FIELD, VERSION_FIELD] {
        document.remove(field);
    }
}

fn parse_id(id: &str) -> Result<String, StoreError> {
    Uuid::parse_str(id)
        .map(|id| id.to_string())
        .map_err(|_| StoreError::cast(ID_FIELD, id, "uuid"))
}

fn has_id(document: &Document, id: &str) -> bool {
    document.get(ID_FIELD).and_then(Value::as_str) == Some(id)
}

/// A named set of documents
///
/// Cheap to clone; clones share the same documents.
#[derive(Debug, Clone)]
pub struct Collection {
    schema: Arc<CollectionSchema>,
    documents: Arc<RwLock<Vec<Document>>>,
}

impl Collection {
    /// Empty collection
    pub fn new(schema: CollectionSchema) -> Self {
        Self {
            schema: Arc::new(schema),
            documents: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// The collection's schema
    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    /// Lazy query over every document
    pub fn find(&self) -> MemoryQuery {
        MemoryQuery {
            schema: Arc::clone(&self.schema),
            documents: Arc::clone(&self.documents),
            predicates: Vec::new(),
            sort: None,
            projection: None,
            skip: 0,
            limit: None,
        }
    }

    /// Look up a document by its identifier
    ///
    /// A malformed identifier is a cast failure, an unknown one is `None`.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let id = parse_id(id)?;

        let documents = self.documents.read().await;
        Ok(documents.iter().find(|doc| has_id(doc, &id)).cloned())
    }

    /// Validate and store a new document
    ///
    /// Assigns `_id`, `createdAt` and `__v`, overwriting any values supplied.
    /// Typed fields are cast first, then required fields are checked, then
    /// unique ones.
    pub async fn insert(&self, mut document: Document) -> Result<Document, StoreError> {
        strip_metadata(&mut document);
        self.schema.coerce(&mut document)?;

        let messages = self.schema.missing_required(&document, false);
        if !messages.is_empty() {
            return Err(StoreError::Validation {
                collection: self.schema.name.clone(),
                messages,
            });
        }

        let mut documents = self.documents.write().await;

        let key_value = self.schema.conflicts(&document, &documents, None);
        if !key_value.is_empty() {
            return Err(StoreError::DuplicateKey {
                collection: self.schema.name.clone(),
                key_value,
            });
        }

        document.insert(ID_FIELD.to_string(), Value::String(Uuid::new_v4().to_string()));
        document.insert(
            CREATED_AT_FIELD.to_string(),
            Value::from(chrono::Utc::now().timestamp_millis()),
        );
        document.insert(VERSION_FIELD.to_string(), Value::from(0));

        documents.push(document.clone());
        tracing::debug!(collection = %self.schema.name, id = ?document.get(ID_FIELD), "document inserted");
        Ok(document)
    }

    /// Merge `patch` into the document with the given identifier
    ///
    /// Only the fields present in `patch` are validated, the way an update
    /// with validators runs. Store-owned fields in `patch` are ignored.
    /// Returns the updated document, or `None` for an unknown identifier.
    pub async fn update_by_id(
        &self,
        id: &str,
        mut patch: Document,
    ) -> Result<Option<Document>, StoreError> {
        let id = parse_id(id)?;
        strip_metadata(&mut patch);
        self.schema.coerce(&mut patch)?;

        let messages = self.schema.missing_required(&patch, true);
        if !messages.is_empty() {
            return Err(StoreError::Validation {
                collection: self.schema.name.clone(),
                messages,
            });
        }

        let mut documents = self.documents.write().await;
        let Some(index) = documents.iter().position(|doc| has_id(doc, &id)) else {
            return Ok(None);
        };

        let key_value = self.schema.conflicts(&patch, &documents, Some(index));
        if !key_value.is_empty() {
            return Err(StoreError::DuplicateKey {
                collection: self.schema.name.clone(),
                key_value,
            });
        }

        let document = &mut documents[index];
        document.extend(patch);
        tracing::debug!(collection = %self.schema.name, %id, "document updated");
        Ok(Some(document.clone()))
    }

    /// Remove the document with the given identifier
    pub async fn delete_by_id(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let id = parse_id(id)?;

        let mut documents = self.documents.write().await;
        let removed = documents
            .iter()
            .position(|doc| has_id(doc, &id))
            .map(|index| documents.remove(index));
        if removed.is_some() {
            tracing::debug!(collection = %self.schema.name, %id, "document deleted");
        }
        Ok(removed)
    }

    /// Remove every document whose `field` equals `value`, returning the count
    pub async fn delete_where(&self, field: &str, value: &Value) -> usize {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|doc| doc.get(field) != Some(value));
        before - documents.len()
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Whether the collection is empty
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Unexecuted query over a [`Collection`]
#[derive(Debug)]
pub struct MemoryQuery {
    schema: Arc<CollectionSchema>,
    documents: Arc<RwLock<Vec<Document>>>,
    predicates: Vec<Document>,
    sort: Option<String>,
    projection: Option<String>,
    skip: u64,
    limit: Option<u64>,
}

impl QueryHandle for MemoryQuery {
    type Output = Vec<Document>;
    type Error = StoreError;

    fn filter(&mut self, predicate: Document) -> &mut Self {
        self.predicates.push(predicate);
        self
    }

    fn sort(&mut self, expr: &str) -> &mut Self {
        self.sort = Some(expr.to_string());
        self
    }

    fn select(&mut self, projection: &str) -> &mut Self {
        self.projection = Some(projection.to_string());
        self
    }

    fn skip(&mut self, n: u64) -> &mut Self {
        self.skip = n;
        self
    }

    fn limit(&mut self, n: u64) -> &mut Self {
        self.limit = Some(n);
        self
    }

    async fn execute(self) -> Result<Self::Output, Self::Error> {
        let conditions = self
            .predicates
            .iter()
            .map(|predicate| compile(&self.schema, predicate))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        let projection = self.projection.as_deref().map(Projection::parse).transpose()?;
        let sort_keys = self.sort.as_deref().map(parse_sort).unwrap_or_default();

        let mut matched: Vec<Document> = {
            let documents = self.documents.read().await;
            documents
                .iter()
                .filter(|doc| conditions.iter().all(|c| c.matches(doc)))
                .cloned()
                .collect()
        };

        if !sort_keys.is_empty() {
            matched.sort_by(|a, b| compare_documents(a, b, &sort_keys));
        }

        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let take = match self.limit {
            Some(0) | None => usize::MAX,
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
        };

        Ok(matched
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|doc| match &projection {
                Some(projection) => projection.apply(doc),
                None => doc,
            })
            .collect())
    }
}

#[derive(Debug)]
enum Test {
    Eq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
}

#[derive(Debug)]
struct Condition {
    path: String,
    test: Test,
}

impl Condition {
    fn matches(&self, doc: &Document) -> bool {
        let value = resolve_path(doc, &self.path);
        match &self.test {
            Test::Eq(expected) => equals(value, expected),
            Test::In(candidates) => candidates.iter().any(|c| equals(value, c)),
            Test::Gt(bound) => any_ordered(value, bound, |o| o == Ordering::Greater),
            Test::Gte(bound) => any_ordered(value, bound, |o| o != Ordering::Less),
            Test::Lt(bound) => any_ordered(value, bound, |o| o == Ordering::Less),
            Test::Lte(bound) => any_ordered(value, bound, |o| o != Ordering::Greater),
        }
    }
}

fn compile(schema: &CollectionSchema, predicate: &Document) -> Result<Vec<Condition>, StoreError> {
    let mut conditions = Vec::new();
    for (path, operand) in predicate {
        if path.starts_with('$') {
            return Err(StoreError::Query(format!("unknown top level operator: {path}")));
        }

        let operators = match operand {
            Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => map,
            _ => {
                conditions.push(Condition {
                    path: path.clone(),
                    test: Test::Eq(schema.cast(path, operand)?),
                });
                continue;
            }
        };

        for (operator, value) in operators {
            let value = schema.cast(path, value)?;
            let test = match operator.as_str() {
                "$gt" => Test::Gt(value),
                "$gte" => Test::Gte(value),
                "$lt" => Test::Lt(value),
                "$lte" => Test::Lte(value),
                "$in" => match value {
                    Value::Array(items) => Test::In(items),
                    single => Test::In(vec![single]),
                },
                other if other.starts_with('$') => {
                    return Err(StoreError::Query(format!("unknown operator: {other}")))
                }
                other => {
                    return Err(StoreError::Query(format!(
                        "cannot mix operators and field '{other}' under '{path}'"
                    )))
                }
            };
            conditions.push(Condition {
                path: path.clone(),
                test,
            });
        }
    }
    Ok(conditions)
}

/// Value at a dot-separated path, `Null` if absent
fn resolve_path<'a>(doc: &'a Document, path: &str) -> &'a Value {
    let mut segments = path.split('.');
    let Some(first) = segments.next().and_then(|s| doc.get(s)) else {
        return &Value::Null;
    };
    segments.fold(first, |current, segment| {
        current.get(segment).unwrap_or(&Value::Null)
    })
}

fn equals(actual: &Value, expected: &Value) -> bool {
    if scalar_eq(actual, expected) {
        return true;
    }
    match actual {
        Value::Array(items) => items.iter().any(|item| scalar_eq(item, expected)),
        _ => false,
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn any_ordered(actual: &Value, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    match actual {
        Value::Array(items) => items
            .iter()
            .any(|item| compare_values(item, bound).is_some_and(&accept)),
        _ => compare_values(actual, bound).is_some_and(accept),
    }
}

/// Ordering between values of the same type; `None` across types
fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order used for sorting: by type first, then by value
fn sort_order(left: &Value, right: &Value) -> Ordering {
    type_rank(left)
        .cmp(&type_rank(right))
        .then_with(|| compare_values(left, right).unwrap_or(Ordering::Equal))
}

fn parse_sort(expr: &str) -> Vec<(String, bool)> {
    expr.split_whitespace()
        .map(|key| match key.strip_prefix('-') {
            Some(field) => (field.to_string(), true),
            None => (key.trim_start_matches('+').to_string(), false),
        })
        .filter(|(field, _)| !field.is_empty())
        .collect()
}

fn compare_documents(a: &Document, b: &Document, keys: &[(String, bool)]) -> Ordering {
    keys.iter()
        .map(|(field, descending)| {
            let ordering = sort_order(resolve_path(a, field), resolve_path(b, field));
            if *descending {
                ordering.reverse()
            } else {
                ordering
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

#[derive(Debug, PartialEq)]
enum Projection {
    Include { fields: Vec<String>, keep_id: bool },
    Exclude(Vec<String>),
}

impl Projection {
    fn parse(expr: &str) -> Result<Self, StoreError> {
        let mut included = Vec::new();
        let mut excluded = Vec::new();
        for token in expr.split_whitespace() {
            match token.strip_prefix('-') {
                Some(field) if !field.is_empty() => excluded.push(field.to_string()),
                Some(_) => {}
                None => included.push(token.trim_start_matches('+').to_string()),
            }
        }

        if included.is_empty() {
            return Ok(Self::Exclude(excluded));
        }

        let keep_id = !excluded.iter().any(|f| f == ID_FIELD);
        if let Some(field) = excluded.iter().find(|f| f.as_str() != ID_FIELD) {
            return Err(StoreError::Query(format!(
                "projection cannot mix inclusion and exclusion (excluding '{field}')"
            )));
        }
        Ok(Self::Include {
            fields: included,
            keep_id,
        })
    }

    fn apply(&self, mut doc: Document) -> Document {
        match self {
            Self::Exclude(fields) => {
                for field in fields {
                    remove_path(&mut doc, field);
                }
                doc
            }
            Self::Include { fields, keep_id } => {
                let mut projected = Map::new();
                if *keep_id {
                    if let Some(id) = doc.remove(ID_FIELD) {
                        projected.insert(ID_FIELD.to_string(), id);
                    }
                }
                for field in fields {
                    let value = resolve_path(&doc, field);
                    if !value.is_null() {
                        insert_path(&mut projected, field, value.clone());
                    }
                }
                projected
            }
        }
    }
}

fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(inner)) = doc.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

fn insert_path(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(inner) = entry {
                insert_path(inner, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryFeatures, QueryParams};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn predicate(value: Value) -> Document {
        doc(value)
    }

    async fn seeded() -> Collection {
        let bootcamps = Collection::new(CollectionSchema::bootcamps());
        for (name, cost, careers, city, housing) in [
            ("Devworks Bootcamp", 10000, vec!["Web Development", "UI/UX"], "Boston", true),
            ("ModernTech Bootcamp", 8000, vec!["Web Development", "Business"], "Kingston", false),
            ("Codemasters", 12000, vec!["Data Science"], "Boston", false),
            ("Devcentral Bootcamp", 15000, vec!["Mobile Development"], "Lowell", true),
        ] {
            bootcamps
                .insert(doc(json!({
                    "name": name,
                    "description": "x",
                    "email": "a@b.co",
                    "address": "somewhere",
                    "careers": careers,
                    "averageCost": cost,
                    "housing": housing,
                    "location": { "city": city },
                })))
                .await
                .unwrap();
        }
        bootcamps
    }

    fn names(docs: &[Document]) -> Vec<&str> {
        docs.iter()
            .map(|d| d.get("name").and_then(Value::as_str).unwrap_or_default())
            .collect()
    }

    #[tokio::test]
    async fn test_insert_assigns_metadata() {
        let bootcamps = seeded().await;
        let all = bootcamps.find().execute().await.unwrap();
        assert_eq!(all.len(), 4);

        let first = &all[0];
        let id = first.get(ID_FIELD).and_then(Value::as_str).unwrap();
        assert!(Uuid::parse_str(id).is_ok());
        assert_eq!(first.get(VERSION_FIELD), Some(&json!(0)));
        assert!(first.get(CREATED_AT_FIELD).unwrap().is_i64());
    }

    #[tokio::test]
    async fn test_insert_reports_every_missing_field() {
        let bootcamps = Collection::new(CollectionSchema::bootcamps());
        let err = bootcamps
            .insert(doc(json!({ "name": "Only a name", "description": "  " })))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StoreError::Validation {
                collection: "bootcamps".to_string(),
                messages: vec![
                    "description is required".to_string(),
                    "email is required".to_string(),
                    "address is required".to_string(),
                    "careers is required".to_string(),
                ],
            }
        );
        assert!(bootcamps.is_empty().await);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_unique_field() {
        let bootcamps = seeded().await;
        let err = bootcamps
            .insert(doc(json!({
                "name": "Codemasters",
                "description": "again",
                "email": "c@d.co",
                "address": "elsewhere",
                "careers": ["Other"],
            })))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StoreError::DuplicateKey {
                collection: "bootcamps".to_string(),
                key_value: vec![("name".to_string(), json!("Codemasters"))],
            }
        );
        assert_eq!(bootcamps.len().await, 4);
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let bootcamps = seeded().await;
        let all = bootcamps.find().execute().await.unwrap();
        let id = all[1].get(ID_FIELD).and_then(Value::as_str).unwrap();

        let found = bootcamps.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(found, all[1]);

        let missing = Uuid::new_v4().to_string();
        assert!(bootcamps.find_by_id(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_malformed_id_is_cast_error() {
        let bootcamps = seeded().await;
        let err = bootcamps.find_by_id("123").await.unwrap_err();
        assert_eq!(err, StoreError::cast("_id", "123", "uuid"));
    }

    #[tokio::test]
    async fn test_filter_casts_numeric_strings() {
        let bootcamps = seeded().await;
        let mut query = bootcamps.find();
        query
            .filter(predicate(json!({ "averageCost": { "$lte": "10000" } })))
            .sort("averageCost");
        let docs = query.execute().await.unwrap();
        assert_eq!(names(&docs), ["ModernTech Bootcamp", "Devworks Bootcamp"]);
    }

    #[tokio::test]
    async fn test_filter_range() {
        let bootcamps = seeded().await;
        let mut query = bootcamps.find();
        query
            .filter(predicate(json!({ "averageCost": { "$gt": 8000, "$lt": "15000" } })))
            .sort("name");
        let docs = query.execute().await.unwrap();
        assert_eq!(names(&docs), ["Codemasters", "Devworks Bootcamp"]);
    }

    #[tokio::test]
    async fn test_filter_equality_on_array_field() {
        let bootcamps = seeded().await;
        let mut query = bootcamps.find();
        query.filter(predicate(json!({ "careers": "Business" })));
        let docs = query.execute().await.unwrap();
        assert_eq!(names(&docs), ["ModernTech Bootcamp"]);
    }

    #[tokio::test]
    async fn test_filter_in_with_scalar_and_array() {
        let bootcamps = seeded().await;

        let mut query = bootcamps.find();
        query.filter(predicate(json!({ "careers": { "$in": ["UI/UX", "Data Science"] } })));
        let mut found = names(&query.execute().await.unwrap())
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        found.sort();
        assert_eq!(found, ["Codemasters", "Devworks Bootcamp"]);

        let mut query = bootcamps.find();
        query.filter(predicate(json!({ "careers": { "$in": "Mobile Development" } })));
        assert_eq!(names(&query.execute().await.unwrap()), ["Devcentral Bootcamp"]);
    }

    #[tokio::test]
    async fn test_filter_dotted_path_and_boolean_cast() {
        let bootcamps = seeded().await;
        let mut query = bootcamps.find();
        query.filter(predicate(json!({ "location.city": "Boston", "housing": "true" })));
        assert_eq!(names(&query.execute().await.unwrap()), ["Devworks Bootcamp"]);
    }

    #[tokio::test]
    async fn test_filter_uncastable_number_is_cast_error() {
        let bootcamps = seeded().await;
        let mut query = bootcamps.find();
        query.filter(predicate(json!({ "averageCost": { "$gte": "cheap" } })));
        assert_eq!(
            query.execute().await.unwrap_err(),
            StoreError::cast("averageCost", "cheap", "number")
        );
    }

    #[tokio::test]
    async fn test_filter_unknown_operator_is_query_error() {
        let bootcamps = seeded().await;
        let mut query = bootcamps.find();
        query.filter(predicate(json!({ "name": { "$regex": ".*" } })));
        assert!(matches!(query.execute().await, Err(StoreError::Query(_))));

        let mut query = bootcamps.find();
        query.filter(predicate(json!({ "$gt": "1" })));
        assert!(matches!(query.execute().await, Err(StoreError::Query(_))));
    }

    #[tokio::test]
    async fn test_multi_key_sort() {
        let bootcamps = seeded().await;
        let mut query = bootcamps.find();
        query.sort("location.city -averageCost");
        let docs = query.execute().await.unwrap();
        assert_eq!(
            names(&docs),
            [
                "Codemasters",
                "Devworks Bootcamp",
                "ModernTech Bootcamp",
                "Devcentral Bootcamp"
            ]
        );
    }

    #[tokio::test]
    async fn test_projection() {
        let bootcamps = seeded().await;

        let mut query = bootcamps.find();
        query.select("-__v -location").sort("name").limit(1);
        let docs = query.execute().await.unwrap();
        assert!(docs[0].get(VERSION_FIELD).is_none());
        assert!(docs[0].get("location").is_none());
        assert!(docs[0].get("email").is_some());

        let mut query = bootcamps.find();
        query.select("name location.city -_id").sort("name").limit(1);
        let docs = query.execute().await.unwrap();
        assert_eq!(
            docs[0],
            doc(json!({ "name": "Codemasters", "location": { "city": "Boston" } }))
        );
    }

    #[tokio::test]
    async fn test_projection_mixing_is_query_error() {
        let bootcamps = seeded().await;
        let mut query = bootcamps.find();
        query.select("name -__v");
        assert!(matches!(query.execute().await, Err(StoreError::Query(_))));
    }

    #[tokio::test]
    async fn test_skip_and_limit() {
        let bootcamps = seeded().await;
        let mut query = bootcamps.find();
        query.sort("name").skip(1).limit(2);
        let docs = query.execute().await.unwrap();
        assert_eq!(names(&docs), ["Devcentral Bootcamp", "Devworks Bootcamp"]);

        let mut query = bootcamps.find();
        query.skip(u64::MAX).limit(10);
        assert!(query.execute().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_with_query_features() {
        let bootcamps = seeded().await;
        let params = QueryParams::from_pairs(vec![
            ("averageCost[gte]".to_string(), "10000".to_string()),
            ("sort".to_string(), "-averageCost".to_string()),
            ("fields".to_string(), "name,averageCost".to_string()),
            ("limit".to_string(), "2".to_string()),
        ]);

        let docs = QueryFeatures::new(bootcamps.find(), &params)
            .add_all_features()
            .execute()
            .await
            .unwrap();

        assert_eq!(names(&docs), ["Devcentral Bootcamp", "Codemasters"]);
        assert_eq!(docs[0].len(), 3);
        assert!(docs[0].contains_key(ID_FIELD));
    }

    #[tokio::test]
    async fn test_default_features_hide_version_and_sort_newest_first() {
        let bootcamps = seeded().await;
        let params = QueryParams::new();

        let docs = QueryFeatures::new(bootcamps.find(), &params)
            .add_all_features()
            .execute()
            .await
            .unwrap();

        assert_eq!(docs.len(), 4);
        assert!(docs.iter().all(|d| !d.contains_key(VERSION_FIELD)));
        let stamps: Vec<i64> = docs
            .iter()
            .map(|d| d[CREATED_AT_FIELD].as_i64().unwrap())
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] >= w[1]));
    }

    async fn id_of(bootcamps: &Collection, name: &str) -> String {
        let mut query = bootcamps.find();
        query.filter(predicate(json!({ "name": name })));
        let docs = query.execute().await.unwrap();
        docs[0][ID_FIELD].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_insert_casts_typed_fields() {
        let courses = Collection::new(CollectionSchema::courses());
        let course = courses
            .insert(doc(json!({
                "title": "Front End Web Development",
                "description": "x",
                "weeks": "8",
                "tuition": 8000,
                "minimumSkill": "beginner",
                "scholarshipAvailable": "false",
                "bootcamp": "b1",
                "_id": "not mine",
            })))
            .await
            .unwrap();

        assert_eq!(course["weeks"], json!(8));
        assert_eq!(course["scholarshipAvailable"], json!(false));
        assert_ne!(course[ID_FIELD], json!("not mine"));
    }

    #[tokio::test]
    async fn test_insert_rejects_uncastable_typed_field() {
        let bootcamps = Collection::new(CollectionSchema::bootcamps());
        let err = bootcamps
            .insert(doc(json!({
                "name": "Typed Bootcamp",
                "description": "x",
                "email": "a@b.co",
                "address": "somewhere",
                "careers": ["Other"],
                "housing": ["yes"],
            })))
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::cast("housing", r#"["yes"]"#, "boolean"));
        assert!(bootcamps.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let bootcamps = seeded().await;
        let id = id_of(&bootcamps, "Codemasters").await;

        let updated = bootcamps
            .update_by_id(&id, doc(json!({ "averageCost": "11000", "phone": "555", "__v": 9 })))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated["averageCost"], json!(11000));
        assert_eq!(updated["phone"], json!("555"));
        assert_eq!(updated["name"], json!("Codemasters"));
        assert_eq!(updated[VERSION_FIELD], json!(0));
        assert_eq!(bootcamps.find_by_id(&id).await.unwrap().unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_keeps_own_unique_value() {
        let bootcamps = seeded().await;
        let id = id_of(&bootcamps, "Codemasters").await;

        let updated = bootcamps
            .update_by_id(&id, doc(json!({ "name": "Codemasters" })))
            .await
            .unwrap();
        assert!(updated.is_some());
    }

    #[tokio::test]
    async fn test_update_rejects_taken_unique_value() {
        let bootcamps = seeded().await;
        let id = id_of(&bootcamps, "Codemasters").await;

        let err = bootcamps
            .update_by_id(&id, doc(json!({ "name": "Devworks Bootcamp" })))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::DuplicateKey {
                collection: "bootcamps".to_string(),
                key_value: vec![("name".to_string(), json!("Devworks Bootcamp"))],
            }
        );
    }

    #[tokio::test]
    async fn test_update_validates_only_present_fields() {
        let bootcamps = seeded().await;
        let id = id_of(&bootcamps, "Codemasters").await;

        let err = bootcamps
            .update_by_id(&id, doc(json!({ "description": "", "email": null })))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::Validation {
                collection: "bootcamps".to_string(),
                messages: vec![
                    "description is required".to_string(),
                    "email is required".to_string(),
                ],
            }
        );

        let err = bootcamps
            .update_by_id(&id, doc(json!({ "averageCost": "cheap" })))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::cast("averageCost", "cheap", "number"));
    }

    #[tokio::test]
    async fn test_update_unknown_and_malformed_ids() {
        let bootcamps = seeded().await;
        let missing = Uuid::new_v4().to_string();
        assert!(bootcamps
            .update_by_id(&missing, Document::new())
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            bootcamps.update_by_id("nope", Document::new()).await.unwrap_err(),
            StoreError::cast("_id", "nope", "uuid")
        );
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let bootcamps = seeded().await;
        let id = id_of(&bootcamps, "Codemasters").await;

        let removed = bootcamps.delete_by_id(&id).await.unwrap().unwrap();
        assert_eq!(removed["name"], json!("Codemasters"));
        assert_eq!(bootcamps.len().await, 3);
        assert!(bootcamps.delete_by_id(&id).await.unwrap().is_none());
        assert!(bootcamps.delete_by_id("123").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_where() {
        let bootcamps = seeded().await;
        let removed = bootcamps.delete_where("housing", &json!(true)).await;
        assert_eq!(removed, 2);
        assert_eq!(bootcamps.len().await, 2);
    }
}
