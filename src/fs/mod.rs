//! Filesystem module.
//!
//! Provides:
//! - Path algebra between remote URIs and the local mirror
//! - The rollback journal of created files and directories
//! - Local naming of mirrored path components

pub mod journal;
pub mod naming;
pub mod paths;

pub use journal::{EntryKind, FileModes, JournalEntry, RollbackJournal};
pub use naming::{inject_tag_into_filename, sanitize_path_component};
pub use paths::{child_component, is_remote, mirror_directory, relative_link, resolve, uri_basename};
