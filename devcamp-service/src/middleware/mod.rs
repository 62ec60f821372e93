//! Middleware layers for the HTTP stack

pub mod panic;
pub mod request_tracking;

pub use panic::{catch_panic_layer, PanicHandler};
pub use request_tracking::{
    request_id_layer, request_id_propagation_layer, sensitive_headers_layer, MakeRequestUuidV7,
    SENSITIVE_HEADERS,
};
