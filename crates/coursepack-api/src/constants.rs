//! API constants

/// Versioned prefix for every package and progress route.
pub use coursepack_core::constants::API_PREFIX;

/// Path the OpenAPI document is served from.
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// Liveness endpoint.
pub const HEALTH_PATH: &str = "/health";
