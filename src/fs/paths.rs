//! Path algebra between remote playlist URIs and the local mirror.

use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::{Error, Result};
use crate::fs::journal::RollbackJournal;
use crate::fs::naming::sanitize_path_component;

/// Whether `uri` is an HTTP(S) URL.
pub fn is_remote(uri: &str) -> bool {
    let lower = uri.get(..8).unwrap_or(uri).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Whether `uri` starts with a `scheme://` prefix.
fn has_scheme(uri: &str) -> bool {
    match uri.find("://") {
        Some(pos) if pos > 0 => {
            let scheme = &uri[..pos];
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

/// Resolve a possibly relative URI against `base`.
///
/// Local bases resolve as filesystem paths; remote bases follow URL rules
/// (scheme-relative, root-relative and directory-relative references).
pub fn resolve(maybe_relative: &str, base: &str) -> Result<String> {
    if has_scheme(maybe_relative) || base.is_empty() {
        return Ok(maybe_relative.to_string());
    }

    if !is_remote(base) {
        if maybe_relative.starts_with('/') {
            return Ok(maybe_relative.to_string());
        }
        return Ok(match base.rfind('/') {
            Some(pos) => format!("{}/{}", &base[..pos], maybe_relative),
            None => maybe_relative.to_string(),
        });
    }

    let base_url =
        Url::parse(base).map_err(|e| Error::InvalidUri(format!("{}: {}", base, e)))?;
    let resolved = base_url
        .join(maybe_relative)
        .map_err(|e| Error::InvalidUri(format!("{} against {}: {}", maybe_relative, base, e)))?;
    Ok(resolved.to_string())
}

/// Last path segment of a URI or path, without query or fragment.
pub fn uri_basename(uri: &str) -> String {
    let path = strip_query(uri);
    path.rsplit('/').next().unwrap_or("").to_string()
}

fn strip_query(uri: &str) -> &str {
    let end = uri.find(['?', '#']).unwrap_or(uri.len());
    &uri[..end]
}

/// Remove a leading `scheme://host/` so only the path remains.
fn strip_origin(uri: &str) -> &str {
    if !is_remote(uri) {
        return uri;
    }
    let after_scheme = match uri.find("://") {
        Some(pos) => &uri[pos + 3..],
        None => return uri,
    };
    match after_scheme.find('/') {
        Some(pos) => &after_scheme[pos + 1..],
        None => "",
    }
}

/// Relative link from the directory of `from_file` to `to_file`.
///
/// Both files are canonicalized first, so they must exist. Returns an empty
/// string when either path cannot be resolved.
pub fn relative_link(from_file: &Path, to_file: &Path) -> String {
    if from_file.as_os_str().is_empty() || to_file.as_os_str().is_empty() {
        return String::new();
    }
    let (from, to) = match (from_file.canonicalize(), to_file.canonicalize()) {
        (Ok(from), Ok(to)) => (from, to),
        _ => return String::new(),
    };

    let from_dir = components(from.parent());
    let to_dir = components(to.parent());
    let file_name = match to.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => return String::new(),
    };

    let common = from_dir
        .iter()
        .zip(to_dir.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut link = "../".repeat(from_dir.len() - common);
    for folder in &to_dir[common..] {
        link.push_str(folder);
        link.push('/');
    }
    link.push_str(&file_name);
    link
}

fn components(path: Option<&Path>) -> Vec<String> {
    path.map(|p| {
        p.components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect()
    })
    .unwrap_or_default()
}

/// The `depth`-th path segment of `path` after the prefix it shares with
/// `base`, or an empty string once segments run out.
///
/// Walking `depth` from zero until empty yields the divergent suffix of
/// `path`, which is what gets replicated under the local mirror.
pub fn child_component(path: &str, base: &str, depth: usize) -> String {
    let resolved = resolve(path, base).unwrap_or_else(|_| path.to_string());
    let path_parts: Vec<&str> = strip_query(strip_origin(&resolved)).split('/').collect();
    let base_parts: Vec<&str> = strip_query(strip_origin(base)).split('/').collect();

    let mut i = 0;
    while i < base_parts.len() && path_parts[i] == base_parts[i] {
        i += 1;
        if path_parts.len() <= i {
            return String::new();
        }
    }

    path_parts
        .get(i + depth)
        .map(|part| part.to_string())
        .unwrap_or_default()
}

/// Create (and journal) the local directory mirroring `uri` relative to
/// `reference`, starting at `root`.
///
/// Walks [`child_component`] until it runs out, reaches the file name of
/// `uri`, or hits one of the `stop` names.
pub fn mirror_directory(
    root: &Path,
    uri: &str,
    reference: &str,
    stop: &[String],
    journal: &mut RollbackJournal,
) -> Result<PathBuf> {
    let file_name = uri_basename(uri);
    journal.ensure_dir_all(root)?;

    let mut dir = root.to_path_buf();
    let mut depth = 0;
    loop {
        let folder = child_component(uri, reference, depth);
        if folder.is_empty() || folder == file_name || stop.contains(&folder) {
            break;
        }
        let Ok(folder) = sanitize_path_component(&folder) else {
            break;
        };
        dir.push(folder);
        journal.ensure_dir(&dir)?;
        depth += 1;
    }

    Ok(dir)
}
