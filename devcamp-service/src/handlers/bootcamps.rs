//! Bootcamp endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};

use crate::failure::{DomainError, Failure};
use crate::query::{Document, QueryFeatures, QueryParams};
use crate::responses::Success;
use crate::router::normalize_base_path;
use crate::state::AppState;
use crate::store::ID_FIELD;

/// Course field referencing the owning bootcamp
const COURSE_BOOTCAMP_FIELD: &str = "bootcamp";

/// `GET {base}/bootcamps`
pub async fn list_bootcamps(
    State(state): State<AppState>,
    params: QueryParams,
) -> Result<Success<Vec<Document>>, Failure> {
    let bootcamps = QueryFeatures::new(state.bootcamps().find(), &params)
        .with_defaults(state.feature_defaults().clone())
        .add_all_features()
        .execute()
        .await?;

    Ok(Success::list(
        "successfully fetched bootcamps",
        "bootcamps",
        bootcamps,
    ))
}

/// `GET {base}/bootcamps/{id}`
pub async fn get_bootcamp(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Success<Document>, Failure> {
    let bootcamp = state
        .bootcamps()
        .find_by_id(&id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("bootcamp with id: '{id}' doesn't exist")))?;

    Ok(Success::item(
        format!("successfully fetched bootcamp with id: '{id}'"),
        "bootcamp",
        bootcamp,
    ))
}

/// `POST {base}/bootcamps`
pub async fn create_bootcamp(
    State(state): State<AppState>,
    body: Result<Json<Document>, JsonRejection>,
) -> Result<Success<Document>, Failure> {
    let Json(document) = body?;
    let bootcamp = state.bootcamps().insert(document).await?;

    let location = bootcamp
        .get(ID_FIELD)
        .and_then(|id| id.as_str())
        .map(|id| format!("{}/bootcamps/{id}", normalize_base_path(&state.config().api.base_path)));

    let created = Success::item("bootcamp was successfully created", "bootcamp", bootcamp).created();
    Ok(match location {
        Some(location) => created.with_location(location),
        None => created,
    })
}

/// `PATCH {base}/bootcamps/{id}`
pub async fn update_bootcamp(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Document>, JsonRejection>,
) -> Result<Success<Document>, Failure> {
    let Json(patch) = body?;
    let bootcamp = state
        .bootcamps()
        .update_by_id(&id, patch)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("bootcamp with id: '{id}' doesn't exist")))?;

    Ok(Success::item(
        format!("successfully updated bootcamp with id: '{id}'"),
        "updatedBootcamp",
        bootcamp,
    ))
}

/// `DELETE {base}/bootcamps/{id}`
///
/// Courses referencing the bootcamp are removed with it.
pub async fn delete_bootcamp(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, Failure> {
    let bootcamp = state
        .bootcamps()
        .delete_by_id(&id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("bootcamp with id: '{id}' doesn't exist")))?;

    if let Some(bootcamp_id) = bootcamp.get(ID_FIELD) {
        let removed = state
            .courses()
            .delete_where(COURSE_BOOTCAMP_FIELD, bootcamp_id)
            .await;
        tracing::debug!(%id, courses = removed, "bootcamp courses removed");
    }

    Ok(StatusCode::NO_CONTENT)
}
