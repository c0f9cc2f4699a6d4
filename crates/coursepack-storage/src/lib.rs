//! Coursepack Storage Library
//!
//! Blob storage for uploaded course archives: the `Storage` trait and its local
//! filesystem implementation.
//!
//! # Storage key format
//!
//! Every archive is stored as `packages/{uuid}-{sanitized original name}`. Keys must
//! not contain `..` or a leading `/`. Key generation is centralized in the `keys`
//! module so backends stay consistent.

pub mod factory;
pub mod keys;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult, StoredFile};

use coursepack_core::AppError;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("File not found: {}", key)),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::IoError(e) => AppError::IoFailure(e.to_string()),
            other => AppError::Storage(other.to_string()),
        }
    }
}
