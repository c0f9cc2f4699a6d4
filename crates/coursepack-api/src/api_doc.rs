//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use coursepack_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Coursepack API",
        version = "0.1.0",
        description = "Course package ingestion and learner progress tracking. Upload SCORM 1.2 or 2004 ZIP packages, resolve their launch resource, and record per-learner progress. Package and progress endpoints are versioned under /api/v1/."
    ),
    paths(
        // Packages
        handlers::packages::upload_package,
        handlers::packages::list_packages,
        handlers::packages::get_package,
        handlers::packages::delete_package,
        handlers::packages::launch_package,
        // Progress
        handlers::packages::list_package_progress,
        handlers::progress::save_progress,
        handlers::progress::get_progress,
        // Health
        handlers::health::health_check,
    ),
    components(schemas(
        models::Package,
        models::PackageVersion,
        models::LaunchInfo,
        models::ProgressRecord,
        models::ProgressUpdate,
        models::LessonStatus,
        error::ErrorResponse,
        handlers::health::HealthCheckResponse,
    )),
    tags(
        (name = "packages", description = "Course package registry"),
        (name = "progress", description = "Per-learner progress tracking"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
