//! Application state shared by all handlers.

use coursepack_core::{Config, RepositoryBackend};
use coursepack_services::{PackageService, ProgressService};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub packages: PackageService,
    pub progress: ProgressService,
    /// Present when the PostgreSQL backend is in use.
    pub pool: Option<PgPool>,
}

impl AppState {
    pub fn repository_backend(&self) -> RepositoryBackend {
        self.config.repository_backend
    }
}
