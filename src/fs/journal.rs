//! Journal of filesystem entries created during a run.
//!
//! Every component that creates files or directories owns a
//! [`RollbackJournal`]. Entries are only recorded when this run created them,
//! so rolling back never touches anything that existed beforehand.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Permission modes applied to created entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileModes {
    pub file: u32,
    pub dir: u32,
}

impl Default for FileModes {
    fn default() -> Self {
        Self {
            file: 0o644,
            dir: 0o777,
        }
    }
}

/// Kind of a journaled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// A file or directory created by this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub kind: EntryKind,
    pub path: PathBuf,
}

/// Append-only record of created entries, replayed in reverse on failure.
#[derive(Debug, Default)]
pub struct RollbackJournal {
    modes: FileModes,
    entries: Vec<JournalEntry>,
}

impl RollbackJournal {
    pub fn new(modes: FileModes) -> Self {
        Self {
            modes,
            entries: Vec::new(),
        }
    }

    pub fn modes(&self) -> FileModes {
        self.modes
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Create a single directory if absent. Returns whether it was created.
    pub fn ensure_dir(&mut self, dir: &Path) -> Result<bool> {
        if dir.exists() {
            return Ok(false);
        }

        fs::create_dir(dir).map_err(|e| Error::folder(dir, e))?;
        apply_mode(dir, self.modes.dir).map_err(|e| Error::folder(dir, e))?;
        self.entries.push(JournalEntry {
            kind: EntryKind::Directory,
            path: dir.to_path_buf(),
        });
        tracing::debug!("Created directory {}", dir.display());
        Ok(true)
    }

    /// Create a directory and every missing ancestor, journaling each one.
    pub fn ensure_dir_all(&mut self, dir: &Path) -> Result<()> {
        let mut missing = Vec::new();
        let mut current = Some(dir);
        while let Some(path) = current {
            if path.as_os_str().is_empty() || path.exists() {
                break;
            }
            missing.push(path.to_path_buf());
            current = path.parent();
        }

        for path in missing.iter().rev() {
            self.ensure_dir(path)?;
        }
        Ok(())
    }

    /// Create an empty file if absent. Returns whether it was created.
    pub fn ensure_file(&mut self, file: &Path) -> Result<bool> {
        if file.exists() {
            return Ok(false);
        }

        match fs::OpenOptions::new().write(true).create_new(true).open(file) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => {
                let dir = file.parent().unwrap_or(file);
                return Err(Error::folder(dir, e));
            }
        }
        apply_mode(file, self.modes.file)?;
        self.entries.push(JournalEntry {
            kind: EntryKind::File,
            path: file.to_path_buf(),
        });
        Ok(true)
    }

    /// Take over entries recorded elsewhere.
    pub fn absorb(&mut self, entries: impl IntoIterator<Item = JournalEntry>) {
        self.entries.extend(entries);
    }

    /// Delete every journaled entry, files first, then directories deepest
    /// first. Deletion failures are swallowed.
    ///
    /// Returns the directories that could not be removed (typically because
    /// another component still has files in them), so the caller can retry
    /// them at a higher level.
    pub fn rollback(&mut self) -> Vec<JournalEntry> {
        let entries = std::mem::take(&mut self.entries);
        let (files, mut dirs): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|entry| entry.kind == EntryKind::File);

        for entry in files.iter().rev() {
            if let Err(e) = fs::remove_file(&entry.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::debug!("Unable to remove {}: {}", entry.path.display(), e);
                }
            }
        }

        dirs.reverse();
        dirs.sort_by_key(|entry| std::cmp::Reverse(entry.path.components().count()));

        let mut leftovers = Vec::new();
        for entry in dirs {
            match fs::remove_dir(&entry.path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::debug!("Unable to remove {}: {}", entry.path.display(), e);
                    leftovers.push(entry);
                }
            }
        }
        leftovers
    }
}

/// Set permission bits on a created entry.
#[cfg(unix)]
pub fn apply_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub fn apply_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_removes_only_created_entries() {
        let root = tempfile::tempdir().unwrap();
        let existing = root.path().join("existing");
        fs::create_dir(&existing).unwrap();
        fs::write(existing.join("keep.ts"), b"keep").unwrap();

        let mut journal = RollbackJournal::default();
        journal.ensure_dir(&existing).unwrap();
        journal.ensure_file(&existing.join("keep.ts")).unwrap();
        journal.ensure_dir_all(&root.path().join("a/b/c")).unwrap();
        journal.ensure_file(&root.path().join("a/b/c/seg.ts")).unwrap();
        journal.ensure_file(&root.path().join("a/list.m3u8")).unwrap();
        assert_eq!(journal.entries().len(), 5);

        let leftovers = journal.rollback();
        assert!(leftovers.is_empty());
        assert!(journal.is_empty());
        assert!(!root.path().join("a").exists());
        assert!(existing.join("keep.ts").exists());
    }

    #[test]
    fn test_rollback_reports_non_empty_directories() {
        let root = tempfile::tempdir().unwrap();
        let mut journal = RollbackJournal::default();
        journal.ensure_dir(&root.path().join("shared")).unwrap();
        fs::write(root.path().join("shared/foreign.ts"), b"x").unwrap();

        let leftovers = journal.rollback();
        assert_eq!(leftovers.len(), 1);
        assert_eq!(leftovers[0].path, root.path().join("shared"));

        fs::remove_file(root.path().join("shared/foreign.ts")).unwrap();
        let mut parent = RollbackJournal::default();
        parent.absorb(leftovers);
        assert!(parent.rollback().is_empty());
        assert!(!root.path().join("shared").exists());
    }

    #[test]
    fn test_ensure_file_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let mut journal = RollbackJournal::default();
        let file = root.path().join("a.ts");
        assert!(journal.ensure_file(&file).unwrap());
        assert!(!journal.ensure_file(&file).unwrap());
        assert_eq!(journal.entries().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_modes_are_applied() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let mut journal = RollbackJournal::new(FileModes {
            file: 0o600,
            dir: 0o750,
        });
        let dir = root.path().join("d");
        journal.ensure_dir(&dir).unwrap();
        journal.ensure_file(&dir.join("f")).unwrap();

        let dir_mode = fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        let file_mode = fs::metadata(dir.join("f")).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o750);
        assert_eq!(file_mode, 0o600);
    }

    #[test]
    fn test_ensure_dir_fails_without_parent() {
        let root = tempfile::tempdir().unwrap();
        let mut journal = RollbackJournal::default();
        let err = journal
            .ensure_dir(&root.path().join("missing/child"))
            .unwrap_err();
        assert!(matches!(err, Error::Folder { .. }));
    }
}
