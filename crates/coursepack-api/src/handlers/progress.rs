use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use coursepack_core::models::{ProgressRecord, ProgressUpdate};
use std::sync::Arc;
use uuid::Uuid;

#[utoipa::path(
    put,
    path = "/api/v1/progress/{learner_id}/{package_id}",
    tag = "progress",
    params(
        ("learner_id" = String, Path, description = "Learner identifier"),
        ("package_id" = Uuid, Path, description = "Package ID")
    ),
    request_body = ProgressUpdate,
    responses(
        (status = 200, description = "Progress saved; omitted fields keep their previous value", body = ProgressRecord),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 404, description = "Package not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(learner_id = %learner_id, package_id = %package_id))]
pub async fn save_progress(
    State(state): State<Arc<AppState>>,
    Path((learner_id, package_id)): Path<(String, Uuid)>,
    ValidatedJson(update): ValidatedJson<ProgressUpdate>,
) -> Result<Json<ProgressRecord>, HttpAppError> {
    let record = state.progress.save(&learner_id, package_id, update).await?;
    Ok(Json(record))
}

#[utoipa::path(
    get,
    path = "/api/v1/progress/{learner_id}/{package_id}",
    tag = "progress",
    params(
        ("learner_id" = String, Path, description = "Learner identifier"),
        ("package_id" = Uuid, Path, description = "Package ID")
    ),
    responses(
        (status = 200, description = "Stored progress", body = ProgressRecord),
        (status = 404, description = "No progress recorded for this learner and package", body = ErrorResponse)
    )
)]
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path((learner_id, package_id)): Path<(String, Uuid)>,
) -> Result<Json<ProgressRecord>, HttpAppError> {
    Ok(Json(state.progress.get(&learner_id, package_id).await?))
}
