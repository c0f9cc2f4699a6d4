//! Manifest parsing
//!
//! Locates `imsmanifest.xml` at the root of an extracted package and converts it
//! into an owned [`ManifestElement`] tree. Attributes are kept apart from child
//! elements and keep their namespace prefix (`adlcp:scormtype`), so both SCORM
//! 1.2 and 2004 spellings stay addressable without re-parsing.

use coursepack_core::constants::MANIFEST_FILE_NAME;
use coursepack_core::AppError;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const MAX_DEPTH: usize = 256;

/// Manifest errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("{} not found in {}", MANIFEST_FILE_NAME, .0.display())]
    Missing(PathBuf),

    #[error("{0}")]
    Malformed(String),

    #[error("I/O error reading manifest: {0}")]
    Io(#[from] io::Error),
}

impl From<ManifestError> for AppError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::Missing(_) => AppError::ManifestMissing(err.to_string()),
            ManifestError::Malformed(msg) => AppError::ManifestMalformed(msg),
            ManifestError::Io(e) => AppError::IoFailure(e.to_string()),
        }
    }
}

/// One element of the parsed manifest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ManifestElement {
    /// Local element name (`resource`, `organizations`, ...).
    pub name: String,
    /// Resolved namespace URI of the element, if any.
    pub namespace: Option<String>,
    /// Attributes keyed by their qualified name (`identifier`, `adlcp:scormType`).
    /// On the root element this also holds the `xmlns`/`xmlns:*` declarations.
    pub attributes: BTreeMap<String, String>,
    /// Concatenated, trimmed text content of this element.
    pub text: String,
    pub children: Vec<ManifestElement>,
}

impl ManifestElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// First attribute present among `names`.
    pub fn attr_any(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.attr(name))
    }

    pub fn child(&self, name: &str) -> Option<&ManifestElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children called `name`; a single occurrence yields a one-element list.
    pub fn children_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a ManifestElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Namespace declarations on this element (`xmlns` and `xmlns:*` attributes).
    pub fn namespace_declarations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .filter(|(k, _)| *k == "xmlns" || k.starts_with("xmlns:"))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Find the manifest at the root of `dir`: exact name first, then a case-insensitive match.
pub fn locate_manifest(dir: &Path) -> Result<PathBuf, ManifestError> {
    let exact = dir.join(MANIFEST_FILE_NAME);
    if exact.is_file() {
        return Ok(exact);
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ManifestError::Missing(dir.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        let matches = entry
            .file_name()
            .to_str()
            .map(|n| n.eq_ignore_ascii_case(MANIFEST_FILE_NAME))
            .unwrap_or(false);
        if matches && entry.file_type()?.is_file() {
            return Ok(entry.path());
        }
    }

    Err(ManifestError::Missing(dir.to_path_buf()))
}

/// Locate and parse the manifest of an extracted package.
pub fn read_manifest(dir: &Path) -> Result<ManifestElement, ManifestError> {
    let path = locate_manifest(dir)?;
    let bytes = fs::read(&path)?;
    let xml = String::from_utf8(bytes)
        .map_err(|e| ManifestError::Malformed(format!("manifest is not valid UTF-8: {}", e)))?;
    let root = parse_manifest_str(&xml)?;
    tracing::debug!(
        path = %path.display(),
        root = %root.name,
        "Manifest parsed"
    );
    Ok(root)
}

/// Parse manifest markup into an owned element tree.
pub fn parse_manifest_str(xml: &str) -> Result<ManifestElement, ManifestError> {
    let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(xml, options)
        .map_err(|e| ManifestError::Malformed(e.to_string()))?;

    let root = doc.root_element();
    let mut element = convert(root, 0)?;
    for ns in root.namespaces() {
        let key = match ns.name() {
            Some(prefix) => format!("xmlns:{}", prefix),
            None => "xmlns".to_string(),
        };
        element.attributes.insert(key, ns.uri().to_string());
    }
    Ok(element)
}

fn convert(node: roxmltree::Node<'_, '_>, depth: usize) -> Result<ManifestElement, ManifestError> {
    if depth > MAX_DEPTH {
        return Err(ManifestError::Malformed(format!(
            "manifest nesting exceeds {} levels",
            MAX_DEPTH
        )));
    }

    let mut attributes = BTreeMap::new();
    for attr in node.attributes() {
        let key = match attr.namespace().and_then(|uri| node.lookup_prefix(uri)) {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, attr.name()),
            _ => attr.name().to_string(),
        };
        attributes.insert(key, attr.value().to_string());
    }

    let mut text = String::new();
    let mut children = Vec::new();
    for child in node.children() {
        if child.is_element() {
            children.push(convert(child, depth + 1)?);
        } else if child.is_text() {
            if let Some(t) = child.text() {
                text.push_str(t);
            }
        }
    }

    Ok(ManifestElement {
        name: node.tag_name().name().to_string(),
        namespace: node.tag_name().namespace().map(str::to_string),
        attributes,
        text: text.trim().to_string(),
        children,
    })
}
