//! Startup and infrastructure errors
//!
//! These are the failures that happen outside of a request: loading
//! configuration, installing the tracing subscriber, binding the listener.
//! They are fatal and surface from `main`, never as an HTTP response.
//! Per-request failures live in [`crate::failure`].

use thiserror::Error;

/// Result type alias using the service error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for service startup
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be assembled from its sources
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Environment mode other than `development` or `production`
    #[error("environment: '{0}' is invalid (expected 'development' or 'production')")]
    InvalidEnvironment(String),

    /// No environment mode was configured
    #[error("environment is not set (expected 'development' or 'production')")]
    MissingEnvironment,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}
