//! Coursepack Core Library
//!
//! This crate provides the domain models, error types and configuration shared by
//! every coursepack component: the package registry entity, the per-learner
//! progress record, and the unified `AppError` taxonomy.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{Config, RepositoryBackend};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    LessonStatus, Package, PackageVersion, ProgressRecord, ProgressUpdate, DEFAULT_TOTAL_TIME,
};
