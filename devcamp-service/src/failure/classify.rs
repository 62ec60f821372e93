//! Raw failures and their classification
//!
//! Handlers return [`Failure`], whatever went wrong. The classifier turns it
//! into an [`AppError`], which is either client-safe ([`DomainError`]) or not
//! ([`OpaqueError`]). Two pure functions do this, one per environment mode:
//!
//! - [`resolve`] (development) keeps every failure as it is, wrapping store
//!   failures as opaque errors with their details attached.
//! - [`classify`] (production) additionally rewrites the recognized store
//!   failure shapes into 400 domain errors.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use serde_json::Value;

use super::domain::{DomainError, StatusClass};
use crate::store::StoreError;

/// Any failure that isn't known to be safe to show a client
#[derive(Debug, Clone)]
pub struct OpaqueError {
    inner: Arc<anyhow::Error>,
    name: Cow<'static, str>,
    status: StatusCode,
    details: Option<Value>,
}

impl OpaqueError {
    /// Wrap an error with status 500
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: Arc::new(err.into()),
            name: Cow::Borrowed("Error"),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            details: None,
        }
    }

    /// Override the status code
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Override the type name shown in verbose responses
    #[must_use]
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Attach a structured payload for verbose responses
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Wrapped error
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full message, including the context chain
    pub fn message(&self) -> String {
        format!("{:#}", self.inner)
    }

    /// HTTP status code
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Derived status class
    pub fn status_class(&self) -> StatusClass {
        StatusClass::from_status(self.status)
    }

    /// Structured payload, if any
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Always false
    pub const fn is_client_safe(&self) -> bool {
        false
    }

    /// Error chain and backtrace
    pub fn stack(&self) -> String {
        format!("{}: {:?}", self.name, self.inner)
    }
}

impl fmt::Display for OpaqueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.inner)
    }
}

impl std::error::Error for OpaqueError {}

/// Anything a handler can fail with
///
/// Converts from domain errors, store errors, `anyhow::Error` and bare
/// strings, so `?` works on all of them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Failure {
    /// Explicitly raised, client-safe
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Raised by the persistence layer
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Everything else
    #[error(transparent)]
    Opaque(#[from] OpaqueError),
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        Self::Opaque(OpaqueError::new(err))
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Self::Opaque(OpaqueError::new(anyhow::Error::msg(message)))
    }
}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Self::from(message.to_string())
    }
}

/// A classified failure, ready to render
#[derive(Debug, Clone)]
pub enum AppError {
    /// Client-safe
    Domain(DomainError),
    /// Not client-safe
    Opaque(OpaqueError),
}

impl AppError {
    /// HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Domain(err) => err.status_code(),
            Self::Opaque(err) => err.status_code(),
        }
    }

    /// Status class
    pub fn status_class(&self) -> StatusClass {
        match self {
            Self::Domain(err) => err.status_class(),
            Self::Opaque(err) => err.status_class(),
        }
    }

    /// Message
    pub fn message(&self) -> String {
        match self {
            Self::Domain(err) => err.message().to_string(),
            Self::Opaque(err) => err.message(),
        }
    }

    /// Type name
    pub fn name(&self) -> &str {
        match self {
            Self::Domain(_) => "DomainError",
            Self::Opaque(err) => err.name(),
        }
    }

    /// Whether the message may be shown to clients
    pub fn is_client_safe(&self) -> bool {
        matches!(self, Self::Domain(_))
    }

    /// Structured payload, if any
    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Domain(_) => None,
            Self::Opaque(err) => err.details(),
        }
    }

    /// Stack trace text
    pub fn stack(&self) -> String {
        match self {
            Self::Domain(err) => err.stack(),
            Self::Opaque(err) => err.stack(),
        }
    }
}

/// Production classification
///
/// Rewrites duplicate-key, cast and validation store failures into 400
/// domain errors. A duplicate key reports its first conflicting field only.
pub fn classify(failure: Failure) -> AppError {
    match failure {
        Failure::Store(err) => match reclassify(&err) {
            Some(domain) => AppError::Domain(domain),
            None => AppError::Opaque(wrap_store(err)),
        },
        other => resolve(other),
    }
}

/// Development classification, no rewriting
pub fn resolve(failure: Failure) -> AppError {
    match failure {
        Failure::Domain(err) => AppError::Domain(err),
        Failure::Store(err) => AppError::Opaque(wrap_store(err)),
        Failure::Opaque(err) => AppError::Opaque(err),
    }
}

fn reclassify(err: &StoreError) -> Option<DomainError> {
    match err {
        StoreError::DuplicateKey { key_value, .. } => {
            let (field, value) = key_value.first()?;
            Some(DomainError::bad_request(format!(
                "duplicate field value: '{field}' = '{}', please use another value",
                plain(value)
            )))
        }
        StoreError::Cast { field, value, .. } => {
            Some(DomainError::bad_request(format!("invalid {field}: '{value}'")))
        }
        StoreError::Validation { messages, .. } => Some(DomainError::bad_request(format!(
            "invalid input data: {}",
            messages.join(". ")
        ))),
        StoreError::Query(_) => None,
    }
}

fn wrap_store(err: StoreError) -> OpaqueError {
    let name = err.name();
    let details = err.details();
    OpaqueError::new(err).with_name(name).with_details(details)
}

/// Strings without their JSON quotes
fn plain(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}
