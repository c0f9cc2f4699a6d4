use crate::{LocalStorage, Storage, StorageResult};
use coursepack_core::Config;
use std::sync::Arc;

/// Create the archive storage backend from configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let storage = LocalStorage::new(config.upload_dir.clone()).await?;
    Ok(Arc::new(storage))
}
