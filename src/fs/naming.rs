//! Local names for mirrored path components.

use std::path::Path;

use crate::error::{Error, Result};

/// Longest directory name kept when mirroring a remote path component.
pub const MAX_COMPONENT_BYTES: usize = 222;

/// Sanitize a remote path component so it can be used as a local directory or
/// file name.
///
/// Rejects components that would escape the mirror root.
pub fn sanitize_path_component(name: &str) -> Result<String> {
    if name == "." || name == ".." {
        return Err(Error::InvalidUri(format!(
            "Path traversal detected: '{}'",
            name
        )));
    }

    if name.contains('\0') {
        return Err(Error::InvalidUri(format!(
            "Null bytes not allowed: '{}'",
            name
        )));
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.trim().is_empty() {
        return Err(Error::InvalidUri(
            "Path component cannot be empty or whitespace-only".to_string(),
        ));
    }

    Ok(truncate_component(&sanitized, MAX_COMPONENT_BYTES).to_string())
}

/// Cut a name to at most `max_bytes`, on a character boundary.
pub fn truncate_component(name: &str, max_bytes: usize) -> &str {
    if name.len() <= max_bytes {
        return name;
    }
    let mut end = max_bytes;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Insert a tag before the extension: `seg.ts` + `ab12` -> `seg-ab12.ts`.
pub fn inject_tag_into_filename(filename: &str, tag: &str) -> String {
    let path = Path::new(filename);
    match (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|e| e.to_str()),
    ) {
        (Some(stem), Some(ext)) => format!("{}-{}.{}", stem, tag, ext),
        _ => format!("{}-{}", filename, tag),
    }
}
