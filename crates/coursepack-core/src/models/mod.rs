//! Data models for the application
//!
//! Two entities live here: the `Package` registry record and the per-learner
//! `ProgressRecord`. Request/response DTOs sit next to the entity they belong to.

mod package;
mod progress;

pub use package::*;
pub use progress::*;
