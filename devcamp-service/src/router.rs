//! Route table
//!
//! ```text
//! GET  /health
//! GET  {base}/bootcamps          list, with query features
//! POST {base}/bootcamps
//! GET  {base}/bootcamps/{id}
//! PATCH {base}/bootcamps/{id}
//! DELETE {base}/bootcamps/{id}    also removes the bootcamp's courses
//! GET  {base}/courses            list, with query features
//! GET  {base}/courses/{id}
//! ```
//!
//! `{base}` is `api.base_path` (default `/api/v1`). Unknown paths answer a
//! 404 domain error, known paths with the wrong method a 405. Failures from
//! every route, the fallbacks included, are rendered by the failure
//! middleware installed here.

use axum::{
    extract::OriginalUri,
    http::Method,
    middleware,
    routing::get,
    Router,
};

use crate::failure::{render_failures, DomainError, Failure};
use crate::handlers::{bootcamps, courses, health};
use crate::state::AppState;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let base = normalize_base_path(&state.config().api.base_path);

    let api = Router::new()
        .route(
            "/bootcamps",
            get(bootcamps::list_bootcamps).post(bootcamps::create_bootcamp),
        )
        .route(
            "/bootcamps/{id}",
            get(bootcamps::get_bootcamp)
                .patch(bootcamps::update_bootcamp)
                .delete(bootcamps::delete_bootcamp),
        )
        .route("/courses", get(courses::list_courses))
        .route("/courses/{id}", get(courses::get_course))
        .method_not_allowed_fallback(method_not_allowed);

    let router = Router::new().route("/health", get(health));
    let router = if base.is_empty() {
        router.merge(api)
    } else {
        router.nest(&base, api)
    };

    tracing::debug!(base_path = %base, "routes registered");

    router
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.responder(),
            render_failures,
        ))
        .with_state(state)
}

async fn not_found(OriginalUri(uri): OriginalUri) -> Failure {
    DomainError::not_found(format!("can't find {} on this server", uri.path())).into()
}

async fn method_not_allowed(method: Method, OriginalUri(uri): OriginalUri) -> Failure {
    DomainError::method_not_allowed(format!("{method} is not allowed on {}", uri.path())).into()
}

/// `api/v1/` → `/api/v1`; `/` and empty → `""`
pub(crate) fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
