//! Constants shared across crates.

/// Manifest document expected at the root of every extracted package.
pub const MANIFEST_FILE_NAME: &str = "imsmanifest.xml";

/// Versioned prefix for all HTTP routes.
pub const API_PREFIX: &str = "/api/v1";

/// Metadata key under which ingestion records the resolved launch resource.
pub const METADATA_ENTRY_POINT: &str = "entry_point";

/// Metadata key under which ingestion records the organization title from the manifest.
pub const METADATA_MANIFEST_TITLE: &str = "manifest_title";

/// Maximum accepted learner identifier length.
pub const MAX_LEARNER_ID_LENGTH: usize = 255;
