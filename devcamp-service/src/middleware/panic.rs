//! Panic recovery

use std::any::Any;

use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;

use crate::failure::ErrorReply;

/// Handler signature accepted by [`CatchPanicLayer::custom`]
pub type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> Response;

/// Answer panics with the generic error envelope
///
/// The panic payload is logged, never sent to the client.
pub fn catch_panic_layer() -> CatchPanicLayer<PanicHandler> {
    CatchPanicLayer::custom(panic_response as PanicHandler)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = detail, "handler panicked");

    ErrorReply::generic().into_response()
}
