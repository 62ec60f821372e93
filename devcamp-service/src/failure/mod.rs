//! Error taxonomy and classifier
//!
//! Every request failure is a [`Failure`]. At the edge it is classified into
//! an [`AppError`] (client-safe [`DomainError`] or [`OpaqueError`]) and
//! rendered by the [`ErrorResponder`] according to the environment mode:
//!
//! | mode        | domain error               | anything else                              |
//! |-------------|----------------------------|--------------------------------------------|
//! | development | full error object + stack  | full error object + stack                  |
//! | production  | `{status, message}`        | `500 {"status":"error","message":"something went wrong"}` |
//!
//! In production, duplicate-key, cast and validation failures from the store
//! are first rewritten into 400 domain errors.

mod classify;
mod domain;
mod respond;

pub use classify::{classify, resolve, AppError, Failure, OpaqueError};
pub use domain::{DomainError, InvalidStatusCode, StatusClass};
pub use respond::{
    render_failures, ErrorBody, ErrorObject, ErrorReply, ErrorResponder, GuardedBody,
    VerboseBody, GENERIC_MESSAGE,
};
