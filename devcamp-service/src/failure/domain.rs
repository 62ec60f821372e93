//! Client-safe domain errors

use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Coarse outcome class rendered as the envelope's `status` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    /// Client-side failure (4xx)
    Fail,
    /// Server-side failure (5xx)
    Error,
}

impl StatusClass {
    /// `Fail` below 500, `Error` from 500 up
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        if status.as_u16() < 500 {
            Self::Fail
        } else {
            Self::Error
        }
    }

    /// Lowercase wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected domain error status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("status code {0} is outside the 400..=599 range")]
pub struct InvalidStatusCode(pub u16);

/// An intentionally raised failure whose message may be shown to clients
///
/// # Example
///
/// ```rust
/// use devcamp_service::failure::{DomainError, StatusClass};
///
/// let err = DomainError::new("bootcamp not found", 404).unwrap();
/// assert_eq!(err.status_class(), StatusClass::Fail);
/// assert!(DomainError::new("nope", 302).is_err());
/// ```
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DomainError {
    message: String,
    status: StatusCode,
    trace: Arc<Backtrace>,
}

impl DomainError {
    /// Create a domain error
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStatusCode`] unless `status_code` is in `400..=599`.
    pub fn new(message: impl Into<String>, status_code: u16) -> Result<Self, InvalidStatusCode> {
        if !(400..=599).contains(&status_code) {
            return Err(InvalidStatusCode(status_code));
        }
        let status =
            StatusCode::from_u16(status_code).map_err(|_| InvalidStatusCode(status_code))?;
        Ok(Self::with_status(message, status))
    }

    fn with_status(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            message: message.into(),
            status,
            trace: Arc::new(Backtrace::capture()),
        }
    }

    /// 400 Bad Request
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_status(message, StatusCode::BAD_REQUEST)
    }

    /// 404 Not Found
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_status(message, StatusCode::NOT_FOUND)
    }

    /// 405 Method Not Allowed
    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::with_status(message, StatusCode::METHOD_NOT_ALLOWED)
    }

    /// 409 Conflict
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_status(message, StatusCode::CONFLICT)
    }

    /// 500 Internal Server Error, still client-safe
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_status(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Client-facing message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status code
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Derived status class
    pub fn status_class(&self) -> StatusClass {
        StatusClass::from_status(self.status)
    }

    /// Always true
    pub const fn is_client_safe(&self) -> bool {
        true
    }

    /// Message followed by the backtrace captured at construction
    ///
    /// The backtrace is only populated when `RUST_BACKTRACE` or
    /// `RUST_LIB_BACKTRACE` is set.
    pub fn stack(&self) -> String {
        format!("DomainError: {}\n{}", self.message, self.trace)
    }
}

impl PartialEq for DomainError {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message && self.status == other.status
    }
}

impl Eq for DomainError {}
