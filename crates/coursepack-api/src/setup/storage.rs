//! Storage and content directory setup

use anyhow::{Context, Result};
use coursepack_core::Config;
use coursepack_services::{create_storage, Storage};
use std::sync::Arc;

/// Create the archive storage backend and make sure the content root exists.
pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    let storage = create_storage(config)
        .await
        .context("Failed to initialize archive storage")?;

    tokio::fs::create_dir_all(&config.content_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create content directory {}",
                config.content_dir.display()
            )
        })?;

    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        content_dir = %config.content_dir.display(),
        "Storage initialized"
    );

    Ok(storage)
}
