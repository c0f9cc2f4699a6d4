//! Service and repository wiring

use crate::state::AppState;
use anyhow::Result;
use coursepack_core::Config;
use coursepack_services::{
    create_repositories, PackageService, PackageServiceConfig, ProgressService, Repositories,
    Storage,
};
use sqlx::PgPool;
use std::sync::Arc;

/// Build repositories for the configured backend and the services on top of them.
pub fn initialize_services(
    config: &Config,
    pool: Option<PgPool>,
    storage: Arc<dyn Storage>,
) -> Result<Arc<AppState>> {
    let repositories = create_repositories(config, pool.clone())?;
    Ok(build_state(config, repositories, storage, pool))
}

/// Assemble the application state from already constructed parts.
pub fn build_state(
    config: &Config,
    repositories: Repositories,
    storage: Arc<dyn Storage>,
    pool: Option<PgPool>,
) -> Arc<AppState> {
    let packages = PackageService::new(
        &repositories,
        storage,
        PackageServiceConfig::from_config(config),
    );
    let progress = ProgressService::new(&repositories);

    Arc::new(AppState {
        config: Arc::new(config.clone()),
        packages,
        progress,
        pool,
    })
}
