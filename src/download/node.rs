//! A playlist of the mirrored tree, bound to its local save path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use m3u8_rs::{ByteRange, Key, KeyMethod};

use crate::dedup::short_tag;
use crate::download::crypto::{key_from_bytes, parse_iv, DecryptParams};
use crate::download::queue::{ProgressCallback, SegmentQueue};
use crate::download::segment::{Descriptor, SegmentUnit};
use crate::error::{Error, Result};
use crate::fs::{
    inject_tag_into_filename, is_remote, mirror_directory, relative_link, resolve,
    sanitize_path_component, uri_basename, FileModes, JournalEntry, RollbackJournal,
};
use crate::playlist::{parse, serialize, Playlist};
use crate::transport::Transport;

/// Settings shared by every node of a mirror.
#[derive(Debug, Clone, Copy)]
pub struct NodeOptions {
    pub modes: FileModes,
    pub decrypt: bool,
    pub concurrency: usize,
}

/// A key already fetched for this playlist.
#[derive(Debug, Clone)]
enum CachedKey {
    Bytes([u8; 16]),
    /// Side file the key was mirrored to.
    File(PathBuf),
}

pub struct PlaylistNode {
    uri: String,
    parent_uri: Option<String>,
    root: PathBuf,
    file_name: Option<String>,
    save_file: Option<PathBuf>,
    options: NodeOptions,
    transport: Arc<dyn Transport>,
    playlist: Option<Playlist>,
    queue: SegmentQueue,
    key_cache: HashMap<String, CachedKey>,
    /// Key in force for the next segments; carried across reloads.
    active_key: Option<DecryptParams>,
    destinations: HashMap<PathBuf, String>,
    journal: RollbackJournal,
}

impl PlaylistNode {
    /// `uri` must already be absolute (URL or local path). Nothing touches
    /// the network or the filesystem until [`load`](Self::load).
    pub fn new(
        uri: impl Into<String>,
        parent_uri: Option<&str>,
        root: &Path,
        file_name: Option<&str>,
        options: NodeOptions,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let queue = SegmentQueue::new(Arc::clone(&transport), options.modes)
            .with_concurrency(options.concurrency);
        Self {
            uri: uri.into(),
            parent_uri: parent_uri.map(str::to_string),
            root: root.to_path_buf(),
            file_name: file_name.map(str::to_string),
            save_file: None,
            options,
            transport,
            playlist: None,
            queue,
            key_cache: HashMap::new(),
            active_key: None,
            destinations: HashMap::new(),
            journal: RollbackJournal::new(options.modes),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn playlist(&self) -> Option<&Playlist> {
        self.playlist.as_ref()
    }

    pub fn playlist_mut(&mut self) -> Option<&mut Playlist> {
        self.playlist.as_mut()
    }

    pub fn is_loaded(&self) -> bool {
        self.playlist.is_some()
    }

    pub fn save_file(&self) -> Option<&Path> {
        self.save_file.as_deref()
    }

    pub fn queue(&self) -> &SegmentQueue {
        &self.queue
    }

    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.queue.set_progress_callback(callback);
    }

    async fn fetch(&self, uri: &str) -> Result<Bytes> {
        if is_remote(uri) {
            Ok(self.transport.get(uri, None).await?)
        } else {
            Ok(Bytes::from(tokio::fs::read(uri).await?))
        }
    }

    /// Fetch and parse the playlist, replacing the one in memory.
    pub async fn load(&mut self) -> Result<()> {
        let bytes = self.fetch(&self.uri).await?;
        let playlist = parse(&bytes)?;
        tracing::debug!(
            "Loaded {} ({})",
            self.uri,
            if playlist.is_master() { "master" } else { "media" }
        );
        self.playlist = Some(playlist);
        Ok(())
    }

    /// Re-fetch for live polling. The segment queue is kept, so segments
    /// already queued are neither re-added nor re-fetched.
    pub async fn reload(&mut self) -> Result<()> {
        self.load().await
    }

    /// Create the save directory and an empty save file on first use.
    /// Returns the save file.
    pub fn prepare(&mut self) -> Result<PathBuf> {
        if let Some(file) = &self.save_file {
            return Ok(file.clone());
        }

        let dir = match &self.parent_uri {
            None => {
                self.journal.ensure_dir_all(&self.root)?;
                self.root.clone()
            }
            Some(parent) => {
                let stop = [uri_basename(parent)];
                mirror_directory(&self.root, &self.uri, parent, &stop, &mut self.journal)?
            }
        };
        let name = match &self.file_name {
            Some(name) => name.clone(),
            None => sanitize_path_component(&uri_basename(&self.uri))
                .unwrap_or_else(|_| "playlist.m3u8".to_string()),
        };

        let file = dir.join(name);
        self.journal.ensure_file(&file)?;
        self.save_file = Some(file.clone());
        Ok(file)
    }

    /// Local destination for a segment source, mirroring its directories
    /// relative to this playlist.
    fn destination(&mut self, source: &str, stop: &[String]) -> Result<PathBuf> {
        let save_dir = self
            .save_file
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        let dir = mirror_directory(&save_dir, source, &self.uri, stop, &mut self.journal)?;

        let tag = short_tag(source);
        let name = sanitize_path_component(&uri_basename(source))
            .unwrap_or_else(|_| format!("segment-{}", tag));
        let mut path = dir.join(&name);
        if matches!(self.destinations.get(&path), Some(owner) if owner != source) {
            path = dir.join(inject_tag_into_filename(&name, &tag));
        }
        self.destinations.insert(path.clone(), source.to_string());
        Ok(path)
    }

    /// Turn the playlist's segments into queue entries.
    ///
    /// Returns how many units were added; already queued sequence numbers
    /// are skipped.
    pub async fn materialize_segments(&mut self) -> Result<usize> {
        let playlist_file = self.prepare()?;
        let Some(media) = self.playlist.as_ref().and_then(Playlist::media) else {
            return Ok(0);
        };
        let first_sequence = media.media_sequence;
        let segments = media.segments.clone();

        let stop = [
            uri_basename(&playlist_file.to_string_lossy()),
            uri_basename(&self.uri),
        ];
        let mut range_ends = HashMap::new();
        let mut added = 0;

        for (index, mut segment) in segments.into_iter().enumerate() {
            let sequence = (first_sequence + index as u64) as f64;
            let source = resolve(&segment.uri, &self.uri)?;
            let local_path = self.destination(&source, &stop)?;

            if let Some(key) = segment.key.take() {
                segment.key = self.apply_key(key, &local_path, &playlist_file).await?;
            }
            let decrypt = self.active_key.clone();

            if let Some(map) = segment.map.take() {
                let map_source = resolve(&map.uri, &self.uri)?;
                let map_path = self.destination(&map_source, &stop)?;
                let range = map.byte_range.clone();
                let mut unit = SegmentUnit::new(Descriptor::Init(map), map_source.clone(), map_path, sequence - 0.5)
                    .with_decrypt(decrypt.clone());
                if let Some(range) = &range {
                    let (offset, length) = explicit_range(range, &map_source, &mut range_ends);
                    unit = unit.with_range(offset, length);
                }
                added += usize::from(self.queue.add(unit, true));
            }

            let range = segment.byte_range.clone();
            let mut unit = SegmentUnit::new(Descriptor::Media(segment), source.clone(), local_path, sequence)
                .with_decrypt(decrypt);
            if let Some(range) = &range {
                let (offset, length) = explicit_range(range, &source, &mut range_ends);
                unit = unit.with_range(offset, length);
            }
            added += usize::from(self.queue.add(unit, true));
        }

        if added > 0 {
            tracing::debug!("{}: {} new segment(s) queued", self.uri, added);
        }
        Ok(added)
    }

    /// Track the key of an `EXT-X-KEY` tag and return the tag to keep on
    /// the segment, if any.
    ///
    /// AES-128 keys are held in memory when decrypting, and the tag is
    /// dropped. Otherwise the key is mirrored next to the segment as a
    /// `.key` file and the tag points at it.
    async fn apply_key(&mut self, mut key: Key, segment_path: &Path, playlist_file: &Path) -> Result<Option<Key>> {
        if matches!(key.method, KeyMethod::None) {
            self.active_key = None;
            return Ok(Some(key));
        }
        let Some(key_uri) = key.uri.clone() else {
            tracing::warn!("{}: key tag without URI", self.uri);
            self.active_key = None;
            return Ok(Some(key));
        };
        let key_source = resolve(&key_uri, &self.uri)?;

        if self.options.decrypt && matches!(key.method, KeyMethod::AES128) {
            let bytes = match self.key_cache.get(&key_source) {
                Some(CachedKey::Bytes(bytes)) => *bytes,
                _ => {
                    let bytes = key_from_bytes(&self.fetch(&key_source).await?)?;
                    self.key_cache.insert(key_source, CachedKey::Bytes(bytes));
                    bytes
                }
            };
            let iv = key.iv.as_deref().map(parse_iv).transpose()?;
            self.active_key = Some(DecryptParams { key: bytes, iv });
            return Ok(None);
        }

        self.active_key = None;
        let key_path = match self.key_cache.get(&key_source) {
            Some(CachedKey::File(path)) => path.clone(),
            _ => {
                let data = self.fetch(&key_source).await?;
                let mut name = segment_path.as_os_str().to_owned();
                name.push(".key");
                let path = PathBuf::from(name);
                self.journal.ensure_file(&path)?;
                tokio::fs::write(&path, &data)
                    .await
                    .map_err(|e| Error::folder(path.parent().unwrap_or(&path), e))?;
                self.key_cache.insert(key_source, CachedKey::File(path.clone()));
                path
            }
        };

        let link = relative_link(playlist_file, &key_path);
        if !link.is_empty() {
            key.uri = Some(link);
        }
        Ok(Some(key))
    }

    /// Submit a fetch round without waiting for it.
    pub fn requeue(&mut self) -> bool {
        self.queue.requeue()
    }

    /// Settle the batch in flight and any local/cached segments.
    pub async fn resolve_queued(&mut self) -> Result<()> {
        self.queue.resolve_queued().await
    }

    /// Finish the queue and save the playlist.
    ///
    /// The playlist is written even when segments are missing or the merge
    /// fails; a merge failure is returned after saving. Returns whether
    /// every segment is ready.
    pub async fn close(&mut self, join: bool, end_list: bool, max_attempts: usize) -> Result<bool> {
        let playlist_file = self.prepare()?;
        let Some(playlist) = self.playlist.as_mut() else {
            return Err(Error::Playlist(format!("{} was never loaded", self.uri)));
        };

        let closed = match playlist {
            Playlist::Media(media) => {
                self.queue
                    .close(join, end_list, media, &playlist_file, max_attempts)
                    .await
            }
            Playlist::Master(_) => Ok(true),
        };
        if matches!(&closed, Err(e) if !matches!(e, Error::Join(_))) {
            return closed;
        }

        let bytes = serialize(playlist)?;
        tokio::fs::write(&playlist_file, bytes).await?;
        tracing::debug!("Saved {}", playlist_file.display());
        closed
    }

    /// Link to this node's saved playlist, relative to `from_file`.
    pub fn relative_uri(&self, from_file: &Path) -> String {
        self.save_file
            .as_deref()
            .map(|file| relative_link(from_file, file))
            .unwrap_or_default()
    }

    /// Delete everything this node and its queue created. Returns the
    /// directories that could not be removed.
    pub fn remove_all(&mut self) -> Vec<JournalEntry> {
        let leftovers = self.queue.remove_all();
        self.journal.absorb(leftovers);
        self.save_file = None;
        self.destinations.clear();
        self.journal.rollback()
    }

    pub fn progress(&self) -> f64 {
        self.queue.progress()
    }

    pub fn duration(&self) -> f64 {
        self.queue.duration_total()
    }
}

/// Byte range with its offset made explicit. A missing offset continues
/// from where the previous range of the same resource ended.
fn explicit_range(range: &ByteRange, source: &str, ends: &mut HashMap<String, u64>) -> (u64, u64) {
    let offset = range
        .offset
        .unwrap_or_else(|| ends.get(source).copied().unwrap_or(0));
    ends.insert(source.to_string(), offset.saturating_add(range.length));
    (offset, range.length)
}
