//! Failure rendering
//!
//! A handler's [`Failure`] never renders itself. Its `IntoResponse` impl
//! parks the failure in the response extensions behind a generic 500, and
//! [`render_failures`], installed once around the whole router, swaps that
//! placeholder for the real reply produced by the [`ErrorResponder`].

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use super::classify::{classify, resolve, AppError, Failure};
use super::domain::{DomainError, StatusClass};
use crate::config::Environment;

/// Message of the guarded-mode envelope for anything not client-safe
pub const GENERIC_MESSAGE: &str = "something went wrong";

/// Development envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerboseBody {
    /// Status class
    pub status: StatusClass,
    /// Error message
    pub message: String,
    /// The classified error
    pub error: ErrorObject,
    /// Stack trace text
    pub stack: String,
}

/// The error instance as shown in development
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorObject {
    /// Type name
    pub name: String,
    /// Error message
    pub message: String,
    /// HTTP status code
    pub status_code: u16,
    /// Status class
    pub status: StatusClass,
    /// Whether the error is a domain error
    pub client_safe: bool,
    /// Store payload, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Production envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardedBody {
    /// Status class
    pub status: StatusClass,
    /// Error message
    pub message: String,
}

/// Response body for a failure
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorBody {
    /// Development
    Verbose(VerboseBody),
    /// Production
    Guarded(GuardedBody),
}

/// Status code and body for a failure
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReply {
    /// HTTP status code
    pub status: StatusCode,
    /// JSON body
    pub body: ErrorBody,
}

impl ErrorReply {
    /// `500 {"status":"error","message":"something went wrong"}`
    pub fn generic() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody::Guarded(GuardedBody {
                status: StatusClass::Error,
                message: GENERIC_MESSAGE.to_string(),
            }),
        }
    }
}

impl IntoResponse for ErrorReply {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Renders failures according to the environment mode
///
/// Built once at startup from [`Environment`] and handed to the failure
/// middleware as state.
///
/// # Example
///
/// ```rust
/// use devcamp_service::config::Environment;
/// use devcamp_service::failure::{ErrorResponder, Failure};
///
/// let responder = ErrorResponder::new(Environment::Production);
/// let reply = responder.render(Failure::from("db password is hunter2"));
/// assert_eq!(reply.status.as_u16(), 500);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorResponder {
    environment: Environment,
}

impl ErrorResponder {
    /// Create a responder for the given mode
    pub const fn new(environment: Environment) -> Self {
        Self { environment }
    }

    /// Configured mode
    pub const fn environment(&self) -> Environment {
        self.environment
    }

    /// Classify a failure for this mode
    pub fn classify(&self, failure: Failure) -> AppError {
        if self.environment.is_verbose() {
            resolve(failure)
        } else {
            classify(failure)
        }
    }

    /// Produce the status code and body for a failure
    pub fn render(&self, failure: Failure) -> ErrorReply {
        let error = self.classify(failure);
        log_failure(&error);

        if self.environment.is_verbose() {
            return verbose(error);
        }

        match error {
            AppError::Domain(err) => ErrorReply {
                status: err.status_code(),
                body: ErrorBody::Guarded(GuardedBody {
                    status: err.status_class(),
                    message: err.message().to_string(),
                }),
            },
            AppError::Opaque(_) => ErrorReply::generic(),
        }
    }

    /// Render a failure into a response
    pub fn respond(&self, failure: Failure) -> Response {
        self.render(failure).into_response()
    }
}

fn verbose(error: AppError) -> ErrorReply {
    let status = error.status_code();
    let message = error.message();
    ErrorReply {
        status,
        body: ErrorBody::Verbose(VerboseBody {
            status: error.status_class(),
            message: message.clone(),
            error: ErrorObject {
                name: error.name().to_string(),
                message,
                status_code: status.as_u16(),
                status: error.status_class(),
                client_safe: error.is_client_safe(),
                details: error.details().cloned(),
            },
            stack: error.stack(),
        }),
    }
}

fn log_failure(error: &AppError) {
    match error {
        AppError::Domain(err) => tracing::debug!(
            status = err.status_code().as_u16(),
            "request failed: {}",
            err.message()
        ),
        AppError::Opaque(err) => tracing::error!(
            status = err.status_code().as_u16(),
            name = err.name(),
            "request failed: {:?}",
            err.inner()
        ),
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let mut response = ErrorReply::generic().into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl From<JsonRejection> for Failure {
    fn from(rejection: JsonRejection) -> Self {
        DomainError::bad_request(format!("invalid request body: {}", rejection.body_text())).into()
    }
}

/// Middleware that renders any [`Failure`] left in the response extensions
///
/// Install with `axum::middleware::from_fn_with_state(responder, render_failures)`
/// as the outermost application layer. Responses without a failure pass
/// through untouched.
pub async fn render_failures(
    State(responder): State<ErrorResponder>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    match response.extensions_mut().remove::<Failure>() {
        Some(failure) => responder.respond(failure),
        None => response,
    }
}
