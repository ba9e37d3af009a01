//! Segment queue of one playlist level.
//!
//! Owns the [`SegmentUnit`]s of a playlist and moves them to `Ready`:
//! local sources and cache hits are resolved in place, remote ones are
//! fetched in batches of bounded concurrency. Results of a batch are applied
//! on the caller's task once the whole batch has completed, so the journal
//! and the content cache are only ever touched from one place.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use m3u8_rs::{ByteRange, MediaPlaylist};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

use crate::download::segment::{Descriptor, SegmentKind, SegmentStatus, SegmentUnit};
use crate::error::{Error, Result};
use crate::fs::{relative_link, FileModes, JournalEntry, RollbackJournal};
use crate::transport::{Transport, TransportError};

/// Maximum concurrent segment requests per queue.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Fetch rounds before a segment is given up on.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Receives a completion fraction in `[0, 1]`.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

type BatchOutcome = Vec<(usize, std::result::Result<Bytes, TransportError>)>;

pub struct SegmentQueue {
    transport: Arc<dyn Transport>,
    units: Vec<SegmentUnit>,
    /// Content key -> destination the bytes were written to.
    cache: HashMap<String, PathBuf>,
    in_flight: Option<JoinHandle<BatchOutcome>>,
    concurrency: usize,
    journal: RollbackJournal,
    on_progress: Option<ProgressCallback>,
}

impl SegmentQueue {
    pub fn new(transport: Arc<dyn Transport>, modes: FileModes) -> Self {
        Self {
            transport,
            units: Vec::new(),
            cache: HashMap::new(),
            in_flight: None,
            concurrency: DEFAULT_CONCURRENCY,
            journal: RollbackJournal::new(modes),
            on_progress: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.on_progress = Some(callback);
    }

    pub fn units(&self) -> &[SegmentUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn ready_count(&self) -> usize {
        self.units.iter().filter(|u| u.is_ready()).count()
    }

    pub fn pending_count(&self) -> usize {
        self.units.iter().filter(|u| !u.is_ready()).count()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Add a unit. With `check_duplicate`, a unit whose sequence number is
    /// already queued is skipped. Returns whether the unit was added.
    pub fn add(&mut self, unit: SegmentUnit, check_duplicate: bool) -> bool {
        if check_duplicate && self.units.iter().any(|u| u.sequence == unit.sequence) {
            return false;
        }
        self.units.push(unit);
        true
    }

    /// `ready / total`, or 1 for an empty queue.
    pub fn progress(&self) -> f64 {
        if self.units.is_empty() {
            return 1.0;
        }
        self.ready_count() as f64 / self.units.len() as f64
    }

    /// Sum of declared segment durations, in seconds.
    pub fn duration_total(&self) -> f64 {
        self.units.iter().map(SegmentUnit::duration).sum()
    }

    fn notify(&self) {
        if let Some(callback) = &self.on_progress {
            callback(self.progress());
        }
    }

    /// Mark pending units whose bytes already sit at their destination.
    fn resolve_cached(&mut self) {
        let mut resolved = 0;
        for unit in self.units.iter_mut().filter(|u| u.is_pending()) {
            if self.cache.get(&unit.content_key()) == Some(&unit.local_path)
                && unit.local_path.exists()
            {
                unit.status = SegmentStatus::Ready;
                resolved += 1;
            }
        }
        if resolved > 0 {
            tracing::debug!("{} segment(s) resolved from cache", resolved);
            self.notify();
        }
    }

    /// Resolve cache hits and local sources without touching the network.
    pub async fn resolve_local_and_cached(&mut self) -> Result<()> {
        self.resolve_cached();

        for index in 0..self.units.len() {
            let unit = &self.units[index];
            if !unit.is_pending() || !unit.is_local() {
                continue;
            }
            match unit.read_local().await {
                Ok(data) => {
                    self.store(index, &data).await?;
                }
                Err(e) => {
                    tracing::warn!("Unable to read {}: {}", unit.source_uri, e);
                }
            }
        }
        Ok(())
    }

    /// Start fetching every remaining pending unit, unless a batch is
    /// already in flight. Returns the number of requests submitted.
    pub fn dispatch_remote(&mut self) -> usize {
        if self.in_flight.is_some() {
            return 0;
        }

        // Units sharing bytes and destination are fetched once; the others
        // resolve from the cache afterwards.
        let mut claimed = HashSet::new();
        let mut requests = Vec::new();
        for (index, unit) in self.units.iter_mut().enumerate() {
            if !unit.is_pending() || unit.is_local() {
                continue;
            }
            if !claimed.insert((unit.content_key(), unit.local_path.clone())) {
                continue;
            }
            unit.status = SegmentStatus::Processing;
            requests.push((index, unit.source_uri.clone(), unit.range_request()));
        }

        let submitted = requests.len();
        if submitted == 0 {
            return 0;
        }

        tracing::debug!(
            "Dispatching {} segment request(s), {} at a time",
            submitted,
            self.concurrency
        );
        let transport = Arc::clone(&self.transport);
        let concurrency = self.concurrency;
        self.in_flight = Some(tokio::spawn(async move {
            stream::iter(requests)
                .map(|(index, url, range)| {
                    let transport = Arc::clone(&transport);
                    async move { (index, transport.get(&url, range).await) }
                })
                .buffer_unordered(concurrency)
                .collect::<BatchOutcome>()
                .await
        }));
        submitted
    }

    /// Wait for the in-flight batch and apply its results.
    pub async fn wait_for_batch(&mut self) -> Result<()> {
        let Some(handle) = self.in_flight.take() else {
            return Ok(());
        };

        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Segment batch did not complete: {}", e);
                for unit in &mut self.units {
                    if unit.status == SegmentStatus::Processing {
                        unit.status = SegmentStatus::Pending;
                    }
                }
                self.notify();
                return Ok(());
            }
        };

        for (index, result) in outcome {
            match result {
                Ok(data) => {
                    self.store(index, &data).await?;
                }
                Err(e) => {
                    tracing::warn!("{} {}: {}", self.units[index].kind(), self.units[index].sequence, e);
                    self.units[index].status = SegmentStatus::Pending;
                    self.notify();
                }
            }
        }

        self.resolve_cached();
        Ok(())
    }

    /// Decrypt and write fetched bytes, then mark the unit ready.
    ///
    /// Undecryptable data leaves the unit pending. Filesystem failures are
    /// returned.
    async fn store(&mut self, index: usize, data: &[u8]) -> Result<bool> {
        let unit = &self.units[index];
        let plain = match unit.prepare(data) {
            Ok(plain) => plain,
            Err(e) => {
                tracing::warn!("{} {}: {}", unit.kind(), unit.sequence, e);
                self.units[index].status = SegmentStatus::Pending;
                self.notify();
                return Ok(false);
            }
        };

        self.journal.ensure_file(&unit.local_path)?;
        unit.write(&plain).await?;

        self.cache.insert(unit.content_key(), unit.local_path.clone());
        self.units[index].status = SegmentStatus::Ready;
        self.notify();
        Ok(true)
    }

    /// Start one more fetch round without waiting for it.
    ///
    /// Does nothing while a batch is still in flight.
    pub fn requeue(&mut self) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        self.resolve_cached();
        self.dispatch_remote() > 0
    }

    /// Settle what is already queued: local sources, cache hits, and the
    /// batch in flight. Never submits new requests.
    pub async fn resolve_queued(&mut self) -> Result<()> {
        self.resolve_local_and_cached().await?;
        self.wait_for_batch().await
    }

    /// Fetch rounds until every unit is ready or `max_attempts` rounds ran.
    ///
    /// Returns whether every unit reached `Ready`.
    pub async fn drive(&mut self, max_attempts: usize) -> Result<bool> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.resolve_local_and_cached().await?;
            self.dispatch_remote();
            self.wait_for_batch().await?;

            let pending = self.pending_count();
            if pending == 0 {
                return Ok(true);
            }
            if attempt >= max_attempts {
                tracing::warn!(
                    "{} segment(s) still missing after {} attempt(s)",
                    pending,
                    attempt
                );
                return Ok(false);
            }
            tracing::debug!(
                "{} segment(s) pending, retrying ({}/{})",
                pending,
                attempt + 1,
                max_attempts
            );
        }
    }

    /// Last drive, optional merge, then the segment list of `media` is
    /// rebuilt from the queue.
    ///
    /// Segments are only merged when all of them are ready. The segment
    /// list is rebuilt even when the merge fails.
    pub async fn close(
        &mut self,
        join: bool,
        end_list: bool,
        media: &mut MediaPlaylist,
        playlist_file: &Path,
        max_attempts: usize,
    ) -> Result<bool> {
        let complete = self.drive(max_attempts).await?;
        let joined = if join && complete {
            self.join().await
        } else {
            Ok(())
        };
        self.rewrite(media, playlist_file);
        if end_list && !media.end_list {
            media.end_list = true;
        }
        joined.map(|()| complete)
    }

    fn sorted_indices(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.units.len()).collect();
        order.sort_by(|&a, &b| self.units[a].sequence.total_cmp(&self.units[b].sequence));
        order
    }

    /// Concatenate every segment file, in sequence order, into one
    /// `_merged.<ext>` file next to the first segment.
    ///
    /// Units are repointed at their byte range inside the merged file and
    /// the original files are removed. Nothing happens when all units
    /// already share a single file.
    pub async fn join(&mut self) -> Result<()> {
        let order = self.sorted_indices();
        let Some(&first) = order.first() else {
            return Ok(());
        };

        let mut distinct: Vec<PathBuf> = Vec::new();
        for &index in &order {
            let path = &self.units[index].local_path;
            if !distinct.contains(path) {
                distinct.push(path.clone());
            }
        }
        if distinct.len() <= 1 {
            tracing::debug!("Segments already share one file, nothing to join");
            return Ok(());
        }

        for path in &distinct {
            if !path.is_file() {
                return Err(Error::Join(format!(
                    "missing segment file {}",
                    path.display()
                )));
            }
        }

        let extension = order
            .iter()
            .map(|&index| &self.units[index])
            .find(|unit| unit.kind() == SegmentKind::Media)
            .and_then(|unit| unit.local_path.extension())
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ts".to_string());
        let merged = self.units[first]
            .local_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("_merged.{}", extension));

        self.journal.ensure_file(&merged)?;
        let placements = match self.write_merged(&order, &merged).await {
            Ok(placements) => placements,
            Err(e) => {
                if let Err(remove) = tokio::fs::remove_file(&merged).await {
                    tracing::debug!("Unable to remove {}: {}", merged.display(), remove);
                }
                return Err(Error::Join(format!(
                    "writing {} failed: {}",
                    merged.display(),
                    e
                )));
            }
        };

        for (&index, (offset, length)) in order.iter().zip(placements) {
            let unit = &mut self.units[index];
            unit.local_path = merged.clone();
            unit.offset = Some(offset);
            unit.length = Some(length);
        }
        for path in &distinct {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::debug!("Unable to remove {}: {}", path.display(), e);
            }
        }
        self.cache.clear();

        tracing::info!("Joined {} segment(s) into {}", order.len(), merged.display());
        Ok(())
    }

    async fn write_merged(&self, order: &[usize], merged: &Path) -> std::io::Result<Vec<(u64, u64)>> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(merged)
            .await?;

        let mut contents: HashMap<&Path, Vec<u8>> = HashMap::new();
        let mut placements = Vec::with_capacity(order.len());
        let mut cursor = 0u64;
        for &index in order {
            let unit = &self.units[index];
            if !contents.contains_key(unit.local_path.as_path()) {
                let data = tokio::fs::read(&unit.local_path).await?;
                contents.insert(unit.local_path.as_path(), data);
            }
            let data = &contents[unit.local_path.as_path()];
            let chunk = match (unit.offset, unit.length) {
                (Some(offset), Some(length)) => {
                    let start = (offset as usize).min(data.len());
                    let end = (offset.saturating_add(length) as usize).min(data.len());
                    &data[start..end]
                }
                _ => &data[..],
            };

            file.write_all(chunk).await?;
            placements.push((cursor, chunk.len() as u64));
            cursor += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(placements)
    }

    /// Rebuild the segment list of `media` in sequence order.
    ///
    /// Ready units point at their local file relative to `playlist_file`;
    /// the others keep their source URI. Init units are folded into the
    /// `EXT-X-MAP` of the segment that follows them.
    pub fn rewrite(&self, media: &mut MediaPlaylist, playlist_file: &Path) {
        let mut segments = Vec::with_capacity(self.units.len());
        let mut pending_map = None;

        for index in self.sorted_indices() {
            let unit = &self.units[index];
            let mut descriptor = unit.descriptor.clone();
            descriptor.relocate(link_for(unit, playlist_file), byte_range(unit));
            match descriptor {
                Descriptor::Init(map) => pending_map = Some(map),
                Descriptor::Media(mut segment) => {
                    segment.map = pending_map.take();
                    segments.push(segment);
                }
            }
        }

        let first_sequence = self
            .units
            .iter()
            .filter(|u| u.kind() == SegmentKind::Media)
            .map(|u| u.sequence)
            .min_by(f64::total_cmp);
        if let Some(sequence) = first_sequence {
            media.media_sequence = sequence.max(0.0) as u64;
        }
        media.segments = segments;
    }

    /// Delete every file this queue created. Returns what could not be removed.
    pub fn remove_all(&mut self) -> Vec<JournalEntry> {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        self.cache.clear();
        self.journal.rollback()
    }
}

fn link_for(unit: &SegmentUnit, playlist_file: &Path) -> String {
    if !unit.is_ready() {
        return unit.source_uri.clone();
    }
    let link = relative_link(playlist_file, &unit.local_path);
    if link.is_empty() {
        unit.source_uri.clone()
    } else {
        link
    }
}

fn byte_range(unit: &SegmentUnit) -> Option<ByteRange> {
    match (unit.offset, unit.length) {
        (Some(offset), Some(length)) => Some(ByteRange {
            length,
            offset: Some(offset),
        }),
        _ => None,
    }
}
