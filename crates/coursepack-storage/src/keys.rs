//! Shared key generation for storage backends.
//!
//! Key format: `packages/{file_name}` where `file_name` is `{uuid}-{sanitized name}`.

use uuid::Uuid;

const KEY_PREFIX: &str = "packages";
const FALLBACK_NAME: &str = "package.zip";

/// Generate the storage key for a stored file name.
pub fn generate_storage_key(file_name: &str) -> String {
    format!("{}/{}", KEY_PREFIX, file_name)
}

/// Build a collision-free file name from the caller's suggestion.
pub fn unique_file_name(suggested_name: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), sanitize_file_name(suggested_name))
}

/// Keep only the base name, replace anything outside `[A-Za-z0-9._-]` and
/// collapse runs of `.` into one.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut cleaned = String::with_capacity(base.len());
    for c in base.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c
        } else {
            '_'
        };
        if c == '.' && cleaned.ends_with('.') {
            continue;
        }
        cleaned.push(c);
    }
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}
