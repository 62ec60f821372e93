//! Axum extractor for [`QueryParams`]

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};

use super::params::QueryParams;
use crate::failure::{DomainError, Failure};

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = Failure;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|e| DomainError::bad_request(format!("invalid query string: {}", e.body_text())))?;

        Ok(QueryParams::from_pairs(pairs))
    }
}
