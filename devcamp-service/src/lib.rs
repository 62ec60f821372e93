//! # devcamp-service
//!
//! Request-processing pipeline for the devcamp bootcamp and course API.
//!
//! ## Features
//!
//! - **Query features**: filtering with comparison operators, pagination,
//!   field projection and sorting, driven by request query parameters
//! - **Error taxonomy**: client-safe domain errors vs. opaque failures, with
//!   store errors reclassified into 400s
//! - **Environment-aware rendering**: verbose failures in development, a
//!   guarded envelope in production
//! - **Middleware stack**: request ids, sensitive header masking, request
//!   tracing, timeouts, panic recovery
//! - **Graceful shutdown**: SIGTERM and SIGINT handling
//!
//! ## Example
//!
//! ```rust,no_run
//! use devcamp_service::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let state = AppState::new(config.clone());
//!     let app = build_router(state);
//!
//!     Server::new(config).serve(app).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod failure;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod query;
pub mod responses;
pub mod router;
pub mod server;
pub mod state;
pub mod store;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ApiConfig, Config, Environment, QueryConfig, ServiceConfig};
    pub use crate::error::{Error, Result};

    pub use crate::failure::{
        classify, render_failures, AppError, DomainError, ErrorResponder, Failure, OpaqueError,
        StatusClass,
    };
    pub use crate::handlers::health;
    pub use crate::middleware::{
        catch_panic_layer, request_id_layer, request_id_propagation_layer,
        sensitive_headers_layer, SENSITIVE_HEADERS,
    };
    pub use crate::observability::init_tracing;
    pub use crate::query::{
        Document, FeatureDefaults, QueryFeatures, QueryHandle, QueryParams, QueryValue,
    };
    pub use crate::responses::{HealthResponse, Success};
    pub use crate::router::build_router;
    pub use crate::server::Server;
    pub use crate::state::{AppState, AppStateBuilder};
    pub use crate::store::{Collection, CollectionSchema, StoreError};

    // Re-export commonly used axum types
    pub use axum::{
        extract::{Path, State},
        routing::{get, post},
        Json, Router,
    };
}
