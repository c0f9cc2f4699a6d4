//! Version and entry-point resolution
//!
//! Works on the parsed [`ManifestElement`] tree. Resolution never fails: a
//! manifest without a usable signal yields SCORM 1.2 and an empty entry path,
//! which callers treat as "no determinable launch point".

use crate::manifest::{read_manifest, ManifestElement};
use coursepack_core::PackageVersion;
use std::path::Path;

const SCORM_2004_MARKER: &str = "2004";
const SCO_TYPE_ATTRS: &[&str] = &["adlcp:scormtype", "adlcp:scormType"];

/// Outcome of resolving a package manifest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedManifest {
    pub version: PackageVersion,
    /// Path of the launch resource relative to the package root, or empty.
    pub entry_point: String,
    /// Title of the selected organization.
    pub title: Option<String>,
}

/// Classify the packaging version from the root namespace declarations.
pub fn detect_version(manifest: &ManifestElement) -> PackageVersion {
    let declared = manifest
        .namespace_declarations()
        .any(|(_, uri)| uri.contains(SCORM_2004_MARKER));
    let resolved = manifest
        .namespace
        .as_deref()
        .is_some_and(|ns| ns.contains(SCORM_2004_MARKER));
    let schema_version = manifest
        .child("metadata")
        .and_then(|m| m.child("schemaversion"))
        .is_some_and(|v| v.text().contains(SCORM_2004_MARKER));

    if declared || resolved || schema_version {
        PackageVersion::Scorm2004
    } else {
        PackageVersion::Scorm12
    }
}

/// Relative path of the resource to launch first, or an empty string.
pub fn resolve_entry_point(manifest: &ManifestElement) -> String {
    let resources: Vec<&ManifestElement> = manifest
        .child("resources")
        .map(|r| r.children_named("resource").collect())
        .unwrap_or_default();

    if let Some(candidate) = selected_organization(manifest).and_then(first_item_reference) {
        let referenced = resources
            .iter()
            .find(|r| r.attr("identifier") == Some(candidate))
            .and_then(|r| non_empty_href(r));
        if let Some(href) = referenced {
            return href.to_string();
        }
    }

    resources
        .iter()
        .filter(|r| is_sco(r))
        .find_map(|r| non_empty_href(r))
        .map(str::to_string)
        .unwrap_or_default()
}

/// Resolve version, entry point and title from a parsed manifest.
pub fn resolve_manifest(manifest: &ManifestElement) -> ResolvedManifest {
    let title = selected_organization(manifest)
        .and_then(|org| org.child("title"))
        .map(|t| t.text().to_string())
        .filter(|t| !t.is_empty());

    ResolvedManifest {
        version: detect_version(manifest),
        entry_point: resolve_entry_point(manifest),
        title,
    }
}

/// Read and resolve the manifest of an extracted package, degrading to defaults on failure.
pub fn resolve_package(dir: &Path) -> ResolvedManifest {
    match read_manifest(dir) {
        Ok(manifest) => {
            let resolved = resolve_manifest(&manifest);
            if resolved.entry_point.is_empty() {
                tracing::warn!(
                    dir = %dir.display(),
                    "No launchable resource found in manifest"
                );
            }
            resolved
        }
        Err(e) => {
            tracing::warn!(
                dir = %dir.display(),
                error = %e,
                "Manifest resolution failed, falling back to SCORM 1.2 without entry point"
            );
            ResolvedManifest::default()
        }
    }
}

fn selected_organization(manifest: &ManifestElement) -> Option<&ManifestElement> {
    let organizations = manifest.child("organizations")?;
    let default_id = organizations.attr("default").filter(|d| !d.is_empty());

    default_id
        .and_then(|id| {
            organizations
                .children_named("organization")
                .find(|o| o.attr("identifier") == Some(id))
        })
        .or_else(|| organizations.child("organization"))
}

fn first_item_reference(element: &ManifestElement) -> Option<&str> {
    element.children_named("item").find_map(|item| {
        item.attr("identifierref")
            .filter(|r| !r.is_empty())
            .or_else(|| first_item_reference(item))
    })
}

fn is_sco(resource: &ManifestElement) -> bool {
    resource
        .attr_any(SCO_TYPE_ATTRS)
        .is_some_and(|t| t.trim().eq_ignore_ascii_case("sco"))
}

fn non_empty_href(resource: &ManifestElement) -> Option<&str> {
    resource.attr("href").filter(|h| !h.trim().is_empty())
}
