//! Course endpoints

use axum::extract::{Path, State};

use crate::failure::{DomainError, Failure};
use crate::query::{Document, QueryFeatures, QueryParams};
use crate::responses::Success;
use crate::state::AppState;

/// `GET {base}/courses`
pub async fn list_courses(
    State(state): State<AppState>,
    params: QueryParams,
) -> Result<Success<Vec<Document>>, Failure> {
    let courses = QueryFeatures::new(state.courses().find(), &params)
        .with_defaults(state.feature_defaults().clone())
        .add_all_features()
        .execute()
        .await?;

    Ok(Success::list("successfully fetched courses", "courses", courses))
}

/// `GET {base}/courses/{id}`
pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Success<Document>, Failure> {
    let course = state
        .courses()
        .find_by_id(&id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("course with id: '{id}' doesn't exist")))?;

    Ok(Success::item(
        format!("successfully fetched course with id: '{id}'"),
        "course",
        course,
    ))
}
