//! Database repositories for data access layer
//!
//! `package` holds the package registry, `progress` the per-learner progress
//! records. Both expose a trait with a PostgreSQL and an in-memory backend.

pub mod package;
pub mod progress;

use coursepack_core::{AppError, Config, RepositoryBackend};
use sqlx::PgPool;
use std::sync::Arc;

pub use package::{InMemoryPackageRepository, PackageRepository, PostgresPackageRepository};
pub use progress::{InMemoryProgressRepository, PostgresProgressRepository, ProgressRepository};

/// Repository handles shared by the service layer.
#[derive(Clone)]
pub struct Repositories {
    pub packages: Arc<dyn PackageRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            packages: Arc::new(InMemoryPackageRepository::new()),
            progress: Arc::new(InMemoryProgressRepository::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            packages: Arc::new(PostgresPackageRepository::new(pool.clone())),
            progress: Arc::new(PostgresProgressRepository::new(pool)),
        }
    }
}

/// Build the repositories for the configured backend.
///
/// The PostgreSQL backend requires a connected pool.
pub fn create_repositories(
    config: &Config,
    pool: Option<PgPool>,
) -> Result<Repositories, AppError> {
    match (config.repository_backend, pool) {
        (RepositoryBackend::Postgres, Some(pool)) => {
            tracing::info!("Initializing PostgreSQL repositories");
            Ok(Repositories::postgres(pool))
        }
        (RepositoryBackend::Postgres, None) => Err(anyhow::anyhow!(
            "REPOSITORY_BACKEND=postgres requires a database connection"
        )
        .into()),
        (RepositoryBackend::Memory, _) => {
            tracing::info!("Initializing in-memory repositories");
            Ok(Repositories::in_memory())
        }
    }
}
