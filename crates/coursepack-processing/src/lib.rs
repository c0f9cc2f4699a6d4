//! Coursepack Processing Library
//!
//! Turns an uploaded course archive into something launchable:
//!
//! - [`archive`] safely extracts a ZIP package into its content directory
//! - [`manifest`] locates and parses `imsmanifest.xml` into an attribute-aware tree
//! - [`resolver`] classifies the packaging version and picks the launch resource

pub mod archive;
pub mod manifest;
pub mod resolver;

pub use archive::{extract_archive, extract_archive_blocking, ExtractError, ExtractLimits, ExtractReport};
pub use manifest::{locate_manifest, parse_manifest_str, read_manifest, ManifestElement, ManifestError};
pub use resolver::{
    detect_version, resolve_entry_point, resolve_manifest, resolve_package, ResolvedManifest,
};
