//! Test helpers: build the router over in-memory repositories and temp directories.
//!
//! Run from workspace root: `cargo test -p coursepack-api`.

#![allow(dead_code)]

pub mod fixtures;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use coursepack_api::constants::API_PREFIX;
use coursepack_api::setup::{routes, services, storage};
use coursepack_core::{Config, RepositoryBackend};
use std::path::PathBuf;
use tempfile::TempDir;
use uuid::Uuid;

/// API path prefix for tests (e.g. `/api/v1/packages`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", API_PREFIX, path)
}

pub struct TestApp {
    pub server: TestServer,
    pub config: Config,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn content_dir(&self) -> PathBuf {
        self.config.content_dir.clone()
    }

    /// Upload a package and return the created record as JSON.
    pub async fn upload(&self, file_name: &str, archive: Vec<u8>, title: &str) -> serde_json::Value {
        let form = MultipartForm::new()
            .add_text("title", title.to_string())
            .add_part(
                "file",
                Part::bytes(archive)
                    .file_name(file_name.to_string())
                    .mime_type("application/zip"),
            );
        let response = self
            .client()
            .post(&api_path("/packages"))
            .multipart(form)
            .await;
        assert_eq!(response.status_code(), 201, "upload failed: {}", response.text());
        response.json()
    }

    pub async fn upload_sample(&self) -> Uuid {
        let package = self
            .upload("course.zip", fixtures::scorm12_package(), "Sample course")
            .await;
        package_id(&package)
    }
}

pub fn package_id(package: &serde_json::Value) -> Uuid {
    Uuid::parse_str(
        package
            .get("id")
            .and_then(|v| v.as_str())
            .expect("Expected 'id' in package response"),
    )
    .expect("Invalid UUID in package response")
}

/// Setup test app with in-memory repositories and local storage.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

pub async fn setup_test_app_with(customize: impl FnOnce(&mut Config)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let mut config = Config {
        repository_backend: RepositoryBackend::Memory,
        upload_dir: temp_dir.path().join("uploads"),
        content_dir: temp_dir.path().join("content"),
        ..Config::default()
    };
    customize(&mut config);

    let storage = storage::setup_storage(&config)
        .await
        .expect("Failed to create storage");
    let state = services::initialize_services(&config, None, storage)
        .expect("Failed to initialize services");
    let app = routes::setup_routes(&config, state).expect("Failed to setup routes");

    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        config,
        _temp_dir: temp_dir,
    }
}
