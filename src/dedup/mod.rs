//! Content deduplication.
//!
//! Provides:
//! - Content keys identifying one fetchable byte range of a source

pub mod hash;

pub use hash::{content_key, short_tag};
