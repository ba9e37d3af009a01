//! Playlist model, codec and rendition selection.

pub mod codec;
pub mod rendition;
pub mod selector;

pub use codec::{parse, serialize, Playlist, DEFAULT_SEGMENT_SECONDS};
pub use rendition::{Rendition, RenditionKind};
pub use selector::RenditionSelector;
