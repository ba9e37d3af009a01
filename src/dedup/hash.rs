//! Content keys for fetched segment data.

use md5::{Digest, Md5};

/// Key identifying the bytes a segment resolves to: its source URI plus the
/// optional byte range.
pub fn content_key(uri: &str, offset: Option<u64>, length: Option<u64>) -> String {
    let mut hasher = Md5::new();
    hasher.update(uri.as_bytes());
    hasher.update(b"-");
    if let Some(offset) = offset {
        hasher.update(offset.to_string().as_bytes());
    }
    hasher.update(b"-");
    if let Some(length) = length {
        hasher.update(length.to_string().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Short hex tag of a URI, used to disambiguate colliding local file names.
pub fn short_tag(uri: &str) -> String {
    let digest = format!("{:x}", Md5::digest(uri.as_bytes()));
    digest[..8].to_string()
}
