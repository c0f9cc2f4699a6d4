//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Location of a stored archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Storage key used for later `delete`/`exists` calls.
    pub key: String,
    /// Unique file name the archive was written under.
    pub file_name: String,
    /// Absolute filesystem path of the stored file.
    pub path: PathBuf,
}

/// Storage abstraction trait
///
/// The package registry only ever needs to put an archive somewhere durable, find it
/// again on disk for extraction, and remove it when the package is deleted.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under a unique name derived from `suggested_name`.
    async fn store(&self, data: Vec<u8>, suggested_name: &str) -> StorageResult<StoredFile>;

    /// Delete a file by its storage key. Deleting a missing file succeeds.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check if a file exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Filesystem path of a stored key, validated against the storage root.
    fn resolve_path(&self, storage_key: &str) -> StorageResult<PathBuf>;
}
