use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::constants::{METADATA_ENTRY_POINT, METADATA_MANIFEST_TITLE};

/// Packaging standard a course archive was authored against.
///
/// `Scorm12` is the fallback whenever the manifest carries no usable signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
pub enum PackageVersion {
    #[default]
    #[serde(rename = "1.2")]
    Scorm12,
    #[serde(rename = "2004")]
    Scorm2004,
}

impl PackageVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageVersion::Scorm12 => "1.2",
            PackageVersion::Scorm2004 => "2004",
        }
    }
}

impl FromStr for PackageVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1.2" | "scorm12" | "scorm 1.2" => Ok(PackageVersion::Scorm12),
            "2004" | "scorm2004" | "scorm 2004" => Ok(PackageVersion::Scorm2004),
            _ => Err(anyhow::anyhow!("Invalid package version: {}", s)),
        }
    }
}

impl Display for PackageVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Registry record for an uploaded course package.
///
/// Records are never mutated in place; a package is replaced by delete + re-upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub version: PackageVersion,
    /// Unique name the archive was stored under (also the storage key's file name).
    pub stored_file_name: String,
    /// Storage key of the uploaded archive.
    pub storage_path: String,
    pub upload_date: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub metadata: Map<String, JsonValue>,
}

impl Package {
    /// Directory name (relative to the content root) holding the extracted archive.
    pub fn content_dir_name(&self) -> &str {
        content_dir_name(&self.stored_file_name)
    }

    /// Launch resource recorded at ingestion, if one was determined.
    pub fn entry_point(&self) -> Option<&str> {
        self.metadata
            .get(METADATA_ENTRY_POINT)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    pub fn manifest_title(&self) -> Option<&str> {
        self.metadata
            .get(METADATA_MANIFEST_TITLE)
            .and_then(|v| v.as_str())
    }
}

/// Strip the archive extension from a stored file name.
///
/// `3f1c...-course.zip` extracts into `3f1c...-course`.
pub fn content_dir_name(stored_file_name: &str) -> &str {
    match stored_file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => stored_file_name,
    }
}

/// Fields needed to insert a new package record.
#[derive(Debug, Clone)]
pub struct NewPackage {
    pub title: String,
    pub description: String,
    pub version: PackageVersion,
    pub stored_file_name: String,
    pub storage_path: String,
    pub metadata: Map<String, JsonValue>,
}

/// Launch information for a package, resolved from its extracted manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LaunchInfo {
    pub package_id: Uuid,
    pub version: PackageVersion,
    /// Root-relative path of the launch resource; empty when none could be determined.
    pub entry_point: String,
    pub launch_url: Option<String>,
}
