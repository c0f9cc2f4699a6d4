use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use coursepack_core::models::{LaunchInfo, Package, PackageVersion, ProgressRecord};
use coursepack_core::AppError;
use coursepack_services::UploadedPackage;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/api/v1/packages",
    tag = "packages",
    request_body(
        content = String,
        content_type = "multipart/form-data",
        description = "Fields: `file` (ZIP archive, required), `title`, `description`, `version` (`1.2` or `2004`), `metadata` (JSON object)"
    ),
    responses(
        (status = 201, description = "Package ingested", body = Package),
        (status = 400, description = "Invalid upload or corrupt archive", body = ErrorResponse),
        (status = 413, description = "Archive too large", body = ErrorResponse),
        (status = 422, description = "Manifest missing or malformed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_package"))]
pub async fn upload_package(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let upload = read_upload_form(multipart, state.config.max_upload_size_bytes).await?;
    let package = state.packages.ingest(upload).await?;
    Ok((StatusCode::CREATED, Json(package)))
}

/// Collect the `file` part and form fields of a package upload.
async fn read_upload_form(
    mut multipart: Multipart,
    max_size: usize,
) -> Result<UploadedPackage, HttpAppError> {
    let mut upload = UploadedPackage::default();
    let mut has_file = false;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string).unwrap_or_default();
        match field_name.as_str() {
            "file" => {
                if has_file {
                    return Err(AppError::InvalidInput(
                        "Multiple file fields are not allowed; send exactly one field named 'file'"
                            .to_string(),
                    )
                    .into());
                }
                upload.file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "package.zip".to_string());
                let data = field.bytes().await?;
                if data.len() > max_size {
                    return Err(AppError::PayloadTooLarge(format!(
                        "File size exceeds maximum allowed size of {} MB",
                        max_size / 1024 / 1024
                    ))
                    .into());
                }
                upload.data = data.to_vec();
                has_file = true;
            }
            "title" => upload.title = non_empty(field.text().await?),
            "description" => upload.description = non_empty(field.text().await?),
            "version" => {
                upload.version = match non_empty(field.text().await?) {
                    Some(v) => Some(v.parse::<PackageVersion>().map_err(|_| {
                        AppError::InvalidInput(format!(
                            "Invalid version '{}': expected '1.2' or '2004'",
                            v
                        ))
                    })?),
                    None => None,
                }
            }
            "metadata" => {
                if let Some(raw) = non_empty(field.text().await?) {
                    upload.metadata = serde_json::from_str::<Map<String, JsonValue>>(&raw)
                        .map_err(|e| {
                            AppError::InvalidInput(format!("metadata must be a JSON object: {}", e))
                        })?;
                }
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    if !has_file {
        return Err(AppError::InvalidInput("No file provided".to_string()).into());
    }
    Ok(upload)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[utoipa::path(
    get,
    path = "/api/v1/packages",
    tag = "packages",
    responses(
        (status = 200, description = "Packages, newest upload first", body = [Package]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_packages(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Package>>, HttpAppError> {
    Ok(Json(state.packages.list().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/packages/{id}",
    tag = "packages",
    params(("id" = Uuid, Path, description = "Package ID")),
    responses(
        (status = 200, description = "Package", body = Package),
        (status = 404, description = "Package not found", body = ErrorResponse)
    )
)]
pub async fn get_package(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Package>, HttpAppError> {
    Ok(Json(state.packages.get(id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/packages/{id}",
    tag = "packages",
    params(("id" = Uuid, Path, description = "Package ID")),
    responses(
        (status = 204, description = "Package, files and progress deleted"),
        (status = 404, description = "Package not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(package_id = %id, operation = "delete_package"))]
pub async fn delete_package(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    state.packages.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/packages/{id}/launch",
    tag = "packages",
    params(("id" = Uuid, Path, description = "Package ID")),
    responses(
        (status = 200, description = "Launch information; `launchUrl` is null when no entry point was found", body = LaunchInfo),
        (status = 404, description = "Package not found", body = ErrorResponse)
    )
)]
pub async fn launch_package(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<LaunchInfo>, HttpAppError> {
    Ok(Json(state.packages.launch(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/packages/{id}/progress",
    tag = "progress",
    params(("id" = Uuid, Path, description = "Package ID")),
    responses(
        (status = 200, description = "Progress of every learner, most recently accessed first", body = [ProgressRecord]),
        (status = 404, description = "Package not found", body = ErrorResponse)
    )
)]
pub async fn list_package_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ProgressRecord>>, HttpAppError> {
    Ok(Json(state.progress.list_for_package(id).await?))
}
