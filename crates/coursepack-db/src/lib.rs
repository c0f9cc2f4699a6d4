//! Coursepack persistence
//!
//! Repositories for package records and learner progress, each available as a
//! PostgreSQL implementation and an in-memory one selected by configuration.

pub mod db;

pub use db::*;
