//! Coursepack Services Layer
//!
//! Business services sitting between the HTTP layer and the repositories:
//! package ingestion, launch resolution and removal in [`PackageService`], learner
//! progress in [`ProgressService`]. Keep coordination here; keep thin HTTP
//! handling in coursepack-api.

pub mod services;

pub use coursepack_db::{create_repositories, Repositories};
pub use coursepack_processing::ExtractLimits;
pub use coursepack_storage::{create_storage, LocalStorage, Storage, StorageError, StorageResult};
pub use services::package::{PackageService, PackageServiceConfig, UploadedPackage};
pub use services::progress::ProgressService;
