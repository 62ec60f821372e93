//! Success envelopes
//!
//! Every successful resource response has the same shape:
//!
//! ```json
//! { "status": "success", "message": "...", "count": 2, "bootcamps": [ ... ] }
//! ```
//!
//! `count` is only present on list responses. The payload key is chosen per
//! resource (`bootcamps`, `bootcamp`, `courses`, ...).
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use devcamp_service::responses::Success;
//!
//! async fn list_courses(State(state): State<AppState>) -> Result<Success<Vec<Document>>, Failure> {
//!     let courses = state.courses().find().execute().await?;
//!     Ok(Success::list("successfully fetched courses", "courses", courses))
//! }
//! ```

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{ser::SerializeMap, Serialize, Serializer};

/// Value of the envelope's `status` field on success
pub const SUCCESS: &str = "success";

/// A success envelope around a payload
#[derive(Debug, Clone)]
pub struct Success<T> {
    status: StatusCode,
    message: String,
    key: &'static str,
    count: Option<usize>,
    payload: T,
    location: Option<String>,
}

impl<T> Success<T> {
    /// 200 envelope holding a single item
    pub fn item(message: impl Into<String>, key: &'static str, payload: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            key,
            count: None,
            payload,
            location: None,
        }
    }

    /// Switch to 201 Created
    #[must_use]
    pub fn created(mut self) -> Self {
        self.status = StatusCode::CREATED;
        self
    }

    /// Add a Location header pointing to the created resource
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// HTTP status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The wrapped payload
    pub fn payload(&self) -> &T {
        &self.payload
    }
}

impl<E> Success<Vec<E>> {
    /// 200 envelope holding a list, with `count` set to its length
    pub fn list(message: impl Into<String>, key: &'static str, payload: Vec<E>) -> Self {
        let count = payload.len();
        Self {
            count: Some(count),
            ..Self::item(message, key, payload)
        }
    }
}

impl<T: Serialize> Serialize for Success<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.count.is_some() { 4 } else { 3 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("status", SUCCESS)?;
        map.serialize_entry("message", &self.message)?;
        if let Some(count) = self.count {
            map.serialize_entry("count", &count)?;
        }
        map.serialize_entry(self.key, &self.payload)?;
        map.end()
    }
}

impl<T: Serialize> IntoResponse for Success<T> {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(&self)).into_response();

        if let Some(location) = &self.location {
            if let Ok(header_value) = HeaderValue::from_str(location) {
                response.headers_mut().insert(header::LOCATION, header_value);
            }
        }

        response
    }
}

/// `{"status":"OK"}`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `OK`
    pub status: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self { status: "OK" }
    }
}
