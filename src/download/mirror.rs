//! Mirror orchestration.
//!
//! A [`Mirror`] owns the master node and one node per selected rendition
//! and drives them through the same passes, in a fixed order:
//!
//! 1. **load**: fetch the master playlist and, once, filter its renditions.
//! 2. **enqueue**: load (or reload) every node, queue its segments and start
//!    a fetch round.
//! 3. **resolve**: settle what was queued.
//! 4. **close**: finish every queue and save every playlist.
//!
//! A rendition that fails is removed from the master playlist and the run
//! goes on, unless it was the last rendition of its tag. Then the whole run
//! fails and everything it created is removed.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::config::Config;
use crate::download::node::{NodeOptions, PlaylistNode};
use crate::download::queue::{DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS};
use crate::download::state::{ProgressTracker, RunSummary};
use crate::error::{Error, Result};
use crate::fs::{is_remote, resolve, FileModes, RollbackJournal};
use crate::playlist::rendition::{count, renditions, retain, rewrite_uris};
use crate::playlist::{Playlist, Rendition, RenditionKind, RenditionSelector, DEFAULT_SEGMENT_SECONDS};
use crate::transport::Transport;

/// Live loop tick.
const TICK: Duration = Duration::from_secs(1);

/// Options of a mirror run.
#[derive(Debug, Clone)]
pub struct MirrorOptions {
    /// Root of the local mirror.
    pub save_to: PathBuf,
    /// File name of the mirrored master playlist.
    pub filename: String,
    pub modes: FileModes,
    pub decrypt: bool,
    pub join: bool,
    pub max_attempts: usize,
    pub concurrency: usize,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            save_to: PathBuf::from("./"),
            filename: "master.m3u8".to_string(),
            modes: FileModes::default(),
            decrypt: false,
            join: false,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl MirrorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            save_to: config.output_directory(),
            filename: config.output.filename.clone(),
            modes: FileModes {
                file: config.output.file_mode,
                dir: config.output.dir_mode,
            },
            decrypt: config.processing.decrypt,
            join: config.processing.join_segments,
            max_attempts: config.processing.max_attempts as usize,
            concurrency: config.processing.concurrency,
        }
    }

    fn node_options(&self) -> NodeOptions {
        NodeOptions {
            modes: self.modes,
            decrypt: self.decrypt,
            concurrency: self.concurrency,
        }
    }
}

struct RenditionNode {
    kind: RenditionKind,
    slot: usize,
    node: PlaylistNode,
}

pub struct Mirror {
    options: MirrorOptions,
    transport: Arc<dyn Transport>,
    selector: RenditionSelector,
    master: PlaylistNode,
    renditions: Vec<RenditionNode>,
    filtered: bool,
    dropped: usize,
    tracker: ProgressTracker,
    journal: RollbackJournal,
}

impl Mirror {
    /// Set up a mirror of `uri` (HTTP(S) URL or local path). Nothing is
    /// fetched yet.
    pub fn new(uri: &str, options: MirrorOptions, transport: Arc<dyn Transport>) -> Result<Self> {
        let uri = if is_remote(uri) {
            url::Url::parse(uri)
                .map_err(|e| Error::InvalidUri(format!("{}: {}", uri, e)))?
                .to_string()
        } else {
            uri.to_string()
        };

        let tracker = ProgressTracker::new();
        let mut master = PlaylistNode::new(
            uri,
            None,
            &options.save_to,
            Some(&options.filename),
            options.node_options(),
            Arc::clone(&transport),
        );
        master.set_progress_callback(tracker.master_callback());

        Ok(Self {
            journal: RollbackJournal::new(options.modes),
            options,
            transport,
            selector: RenditionSelector::default(),
            master,
            renditions: Vec::new(),
            filtered: false,
            dropped: 0,
            tracker,
        })
    }

    /// Set up a mirror and load its master playlist, so renditions can be
    /// listed before downloading.
    pub async fn connect(uri: &str, options: MirrorOptions, transport: Arc<dyn Transport>) -> Result<Self> {
        let mut mirror = Self::new(uri, options, transport)?;
        mirror.master.load().await?;
        Ok(mirror)
    }

    /// Renditions of the master playlist, before selection.
    pub fn available_renditions(&self) -> Vec<Rendition> {
        self.master
            .playlist()
            .and_then(Playlist::master)
            .map(|master| self.selector.available(master))
            .unwrap_or_default()
    }

    /// Replace the rendition selector. Has no effect once the first pass ran.
    pub fn set_selector(&mut self, selector: RenditionSelector) {
        if self.filtered {
            tracing::warn!("Renditions already selected, ignoring new selector");
            return;
        }
        self.selector = selector;
    }

    /// Receive aggregate progress in `[0, 1]`.
    pub fn on_progress<F>(&self, callback: F)
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.tracker.set_callback(Arc::new(callback));
    }

    pub fn progress(&self) -> f64 {
        self.tracker.current()
    }

    /// Local path of the mirrored master playlist.
    pub fn save_file_path(&self) -> PathBuf {
        self.options.save_to.join(&self.options.filename)
    }

    /// Longest total duration among the mirrored playlists, in seconds.
    pub fn duration(&self) -> f64 {
        self.renditions
            .iter()
            .map(|r| r.node.duration())
            .fold(self.master.duration(), f64::max)
    }

    pub fn summary(&self) -> RunSummary {
        let queues = std::iter::once(self.master.queue()).chain(self.renditions.iter().map(|r| r.node.queue()));
        let (ready, total) = queues.fold((0, 0), |(ready, total), queue| {
            (ready + queue.ready_count(), total + queue.len())
        });
        RunSummary {
            save_file: self.save_file_path(),
            renditions: self.renditions.len(),
            renditions_dropped: self.dropped,
            segments_ready: ready,
            segments_total: total,
            duration_seconds: self.duration(),
        }
    }

    /// Mirror the whole tree once. Every saved media playlist is marked
    /// as finished.
    pub async fn download(&mut self) -> Result<()> {
        let outcome = self.run_once().await;
        self.settle(outcome)
    }

    /// Record a live stream for `window`, then close every playlist with
    /// an end marker.
    pub async fn download_live(&mut self, window: Duration) -> Result<()> {
        let outcome = self.run_live(window).await;
        self.settle(outcome)
    }

    async fn run_once(&mut self) -> Result<()> {
        self.load().await?;
        self.enqueue(false).await?;
        self.resolve().await?;
        self.close(true).await
    }

    async fn run_live(&mut self, window: Duration) -> Result<()> {
        self.load().await?;
        let start = Instant::now();
        self.enqueue(false).await?;
        self.resolve().await?;

        let interval = self.poll_interval();
        tracing::info!(
            "Recording for {}s, reloading every {}s",
            window.as_secs_f64(),
            interval.as_secs_f64()
        );

        let mut last_reload = start;
        loop {
            let elapsed = start.elapsed();
            let scale = if window.is_zero() {
                1.0
            } else {
                elapsed.as_secs_f64() / window.as_secs_f64()
            };
            self.tracker.set_scale(scale);
            self.tracker.emit();
            if elapsed >= window {
                break;
            }

            sleep(TICK).await;
            let reload = last_reload.elapsed() >= interval;
            if reload {
                last_reload = Instant::now();
            }
            self.enqueue(reload).await?;
            self.resolve().await?;
        }

        self.tracker.set_scale(1.0);
        self.close(true).await
    }

    fn settle(&mut self, outcome: Result<()>) -> Result<()> {
        match outcome {
            Ok(()) => {
                self.tracker.set_scale(1.0);
                self.tracker.emit();
                tracing::info!("Mirror saved to {}", self.save_file_path().display());
                Ok(())
            }
            Err(e) => {
                tracing::error!("Mirroring failed: {}", e);
                self.rollback();
                Err(e)
            }
        }
    }

    /// Remove every file and directory this run created.
    pub fn rollback(&mut self) {
        for entry in &mut self.renditions {
            let leftovers = entry.node.remove_all();
            self.journal.absorb(leftovers);
        }
        let leftovers = self.master.remove_all();
        self.journal.absorb(leftovers);

        for entry in self.journal.rollback() {
            tracing::warn!("Unable to remove {}", entry.path.display());
        }
    }

    /// Polling interval: the first declared segment duration.
    fn poll_interval(&self) -> Duration {
        let seconds = self
            .master
            .playlist()
            .and_then(Playlist::first_segment_duration)
            .or_else(|| {
                self.renditions
                    .first()
                    .and_then(|r| r.node.playlist())
                    .and_then(Playlist::first_segment_duration)
            })
            .unwrap_or(DEFAULT_SEGMENT_SECONDS);
        Duration::from_secs_f64(seconds)
    }

    async fn load(&mut self) -> Result<()> {
        if !self.master.is_loaded() {
            self.master.load().await?;
        }
        if self.filtered {
            return Ok(());
        }
        self.filtered = true;

        let master_uri = self.master.uri().to_string();
        let Some(master) = self.master.playlist_mut().and_then(Playlist::master_mut) else {
            return Ok(());
        };

        let before = renditions(master).len();
        let remaining = self.selector.filter(master);
        if before > 0 && remaining == 0 {
            return Err(Error::RunFailure("no rendition left after selection".to_string()));
        }

        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for rendition in renditions(master) {
            let Some(uri) = rendition.uri else {
                continue;
            };
            let resolved = resolve(&uri, &master_uri)?;
            if seen.insert(resolved.clone()) {
                targets.push((rendition.kind, resolved));
            }
        }

        for (kind, uri) in targets {
            let mut node = PlaylistNode::new(
                uri,
                Some(&master_uri),
                &self.options.save_to,
                None,
                self.options.node_options(),
                Arc::clone(&self.transport),
            );
            let (slot, callback) = self.tracker.register();
            node.set_progress_callback(callback);
            self.renditions.push(RenditionNode { kind, slot, node });
        }

        tracing::info!("{} rendition(s) to mirror", self.renditions.len());
        Ok(())
    }

    async fn enqueue(&mut self, reload: bool) -> Result<()> {
        let mut index = 0;
        while index < self.renditions.len() {
            match enqueue_node(&mut self.renditions[index].node, reload).await {
                Ok(()) => index += 1,
                Err(e) => self.drop_rendition(index, e)?,
            }
        }
        enqueue_node(&mut self.master, reload).await
    }

    async fn resolve(&mut self) -> Result<()> {
        let mut index = 0;
        while index < self.renditions.len() {
            match self.renditions[index].node.resolve_queued().await {
                Ok(()) => index += 1,
                Err(e) => self.drop_rendition(index, e)?,
            }
        }
        self.master.resolve_queued().await?;
        self.tracker.emit();
        Ok(())
    }

    async fn close(&mut self, end_list: bool) -> Result<()> {
        let join = self.options.join;
        let max_attempts = self.options.max_attempts;

        let mut index = 0;
        while index < self.renditions.len() {
            let node = &mut self.renditions[index].node;
            let failure = match node.close(join, end_list, max_attempts).await {
                Ok(true) => None,
                Ok(false) => Some(Error::RunFailure(format!(
                    "{} has segments missing after {} attempt(s)",
                    node.uri(),
                    max_attempts
                ))),
                Err(e) => Some(e),
            };
            match failure {
                None => index += 1,
                Some(e) => self.drop_rendition(index, e)?,
            }
        }

        let master_file = self.master.prepare()?;
        let master_uri = self.master.uri().to_string();
        let links: Vec<(RenditionKind, String, String)> = self
            .renditions
            .iter()
            .map(|r| (r.kind, r.node.uri().to_string(), r.node.relative_uri(&master_file)))
            .filter(|(_, _, link)| !link.is_empty())
            .collect();
        if let Some(master) = self.master.playlist_mut().and_then(Playlist::master_mut) {
            for kind in RenditionKind::ORDER {
                rewrite_uris(master, kind, |uri| {
                    let resolved = resolve(uri, &master_uri).ok()?;
                    links
                        .iter()
                        .find(|(k, u, _)| *k == kind && *u == resolved)
                        .map(|(_, _, link)| link.clone())
                });
            }
        }

        if !self.master.close(join, end_list, max_attempts).await? {
            return Err(Error::RunFailure(format!(
                "{} has segments missing after {} attempt(s)",
                master_uri, max_attempts
            )));
        }
        Ok(())
    }

    /// Tear down a failed rendition and remove it from the master playlist.
    ///
    /// Fails the run when it was the last rendition of its tag.
    fn drop_rendition(&mut self, index: usize, error: Error) -> Result<()> {
        let mut entry = self.renditions.remove(index);
        tracing::warn!("Dropping {} {}: {}", entry.kind, entry.node.uri(), error);

        let leftovers = entry.node.remove_all();
        self.journal.absorb(leftovers);
        self.tracker.unregister(entry.slot);
        self.dropped += 1;

        let master_uri = self.master.uri().to_string();
        let failed_uri = entry.node.uri();
        let remaining = match self.master.playlist_mut().and_then(Playlist::master_mut) {
            Some(master) => {
                retain(master, |kind, _, uri| {
                    let same = uri
                        .and_then(|uri| resolve(uri, &master_uri).ok())
                        .is_some_and(|resolved| resolved == failed_uri);
                    !(kind == entry.kind && same)
                });
                count(master, entry.kind)
            }
            None => 0,
        };

        if remaining == 0 {
            return Err(Error::RunFailure(format!(
                "last {} rendition failed: {}",
                entry.kind, error
            )));
        }
        Ok(())
    }
}

async fn enqueue_node(node: &mut PlaylistNode, reload: bool) -> Result<()> {
    if !node.is_loaded() {
        node.load().await?;
    } else if reload && !node.playlist().is_some_and(Playlist::is_master) {
        if let Err(e) = node.reload().await {
            tracing::warn!("Reloading {} failed, keeping previous playlist: {}", node.uri(), e);
        }
    }
    node.materialize_segments().await?;
    node.requeue();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectionMode;
    use crate::playlist::parse;
    use crate::transport::testing::ScriptedTransport;
    use std::fs;
    use std::sync::Mutex;

    const MASTER: &str = "https://cdn.test/show/master.m3u8";

    const MASTER_BODY: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=500000
low/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=1200000
high/index.m3u8
";

    fn media(segments: &[&str]) -> String {
        let mut body = String::from("#EXTM3U\n#EXT-X-TARGETDURATION:10\n");
        for segment in segments {
            body.push_str(&format!("#EXTINF:10.0,\n{}\n", segment));
        }
        body.push_str("#EXT-X-ENDLIST\n");
        body
    }

    fn transport() -> ScriptedTransport {
        ScriptedTransport::new()
            .with_body(MASTER, MASTER_BODY)
            .with_body("https://cdn.test/show/low/index.m3u8", media(&["a.ts", "b.ts"]))
            .with_body("https://cdn.test/show/low/a.ts", "la")
            .with_body("https://cdn.test/show/low/b.ts", "lb")
            .with_body("https://cdn.test/show/high/index.m3u8", media(&["a.ts", "b.ts"]))
            .with_body("https://cdn.test/show/high/a.ts", "ha")
            .with_body("https://cdn.test/show/high/b.ts", "hb")
    }

    fn options(root: &std::path::Path) -> MirrorOptions {
        MirrorOptions {
            save_to: root.join("out"),
            max_attempts: 2,
            ..Default::default()
        }
    }

    fn saved_master(mirror: &Mirror) -> Vec<String> {
        let saved = parse(&fs::read(mirror.save_file_path()).unwrap()).unwrap();
        saved
            .master()
            .unwrap()
            .variants
            .iter()
            .map(|v| v.uri.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_download_mirrors_every_rendition() {
        let root = tempfile::tempdir().unwrap();
        let mut mirror = Mirror::new(MASTER, options(root.path()), Arc::new(transport())).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        mirror.on_progress(move |p| sink.lock().unwrap().push(p));

        mirror.download().await.unwrap();

        let out = root.path().join("out");
        assert_eq!(fs::read(out.join("low/a.ts")).unwrap(), b"la");
        assert_eq!(fs::read(out.join("high/b.ts")).unwrap(), b"hb");
        assert!(out.join("high/index.m3u8").is_file());
        assert_eq!(saved_master(&mirror), vec!["low/index.m3u8", "high/index.m3u8"]);

        assert_eq!(mirror.progress(), 1.0);
        assert_eq!(seen.lock().unwrap().last().copied(), Some(1.0));
        assert_eq!(mirror.duration(), 20.0);

        let summary = mirror.summary();
        assert_eq!(summary.renditions, 2);
        assert_eq!(summary.segments_total, 4);
        assert!(summary.is_complete());
    }

    #[tokio::test]
    async fn test_connect_lists_and_better_selects() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(transport());
        let mut mirror = Mirror::connect(MASTER, options(root.path()), transport.clone())
            .await
            .unwrap();

        let keys: Vec<String> = mirror.available_renditions().into_iter().map(|r| r.key).collect();
        assert_eq!(
            keys,
            vec![
                "EXT-X-STREAM-INF-bandwidth:500000",
                "EXT-X-STREAM-INF-bandwidth:1200000",
            ]
        );

        mirror.set_selector(RenditionSelector::new(SelectionMode::Better));
        mirror.download().await.unwrap();

        assert_eq!(saved_master(&mirror), vec!["high/index.m3u8"]);
        assert_eq!(transport.requests("https://cdn.test/show/low/index.m3u8"), 0);
        assert_eq!(transport.requests(MASTER), 1);
        assert!(!root.path().join("out/low").exists());
    }

    #[tokio::test]
    async fn test_failed_rendition_is_dropped() {
        let root = tempfile::tempdir().unwrap();
        let transport = transport().fail_always("https://cdn.test/show/high/b.ts");
        let mut mirror = Mirror::new(MASTER, options(root.path()), Arc::new(transport)).unwrap();

        mirror.download().await.unwrap();

        assert_eq!(saved_master(&mirror), vec!["low/index.m3u8"]);
        assert!(!root.path().join("out/high").exists());
        assert!(root.path().join("out/low/b.ts").is_file());
        assert_eq!(mirror.summary().renditions_dropped, 1);
    }

    #[tokio::test]
    async fn test_last_rendition_failure_rolls_back() {
        let root = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new()
            .with_body(MASTER, "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=500000\nlow/index.m3u8\n")
            .with_body("https://cdn.test/show/low/index.m3u8", media(&["a.ts", "b.ts"]))
            .with_body("https://cdn.test/show/low/a.ts", "la")
            .fail_always("https://cdn.test/show/low/b.ts");
        let mut mirror = Mirror::new(MASTER, options(root.path()), Arc::new(transport)).unwrap();

        let err = mirror.download().await.unwrap_err();
        assert!(matches!(err, Error::RunFailure(_)));
        assert!(!root.path().join("out").exists());
        assert!(root.path().exists());
    }

    #[tokio::test]
    async fn test_rollback_keeps_preexisting_directories() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("out");
        fs::create_dir_all(out.join("low")).unwrap();
        fs::write(out.join("low/notes.txt"), b"mine").unwrap();

        let transport = ScriptedTransport::new()
            .with_body(MASTER, "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=500000\nlow/index.m3u8\n")
            .fail_always("https://cdn.test/show/low/index.m3u8");
        let mut mirror = Mirror::new(MASTER, options(root.path()), Arc::new(transport)).unwrap();

        assert!(mirror.download().await.is_err());
        assert_eq!(fs::read(out.join("low/notes.txt")).unwrap(), b"mine");
        assert!(!out.join("master.m3u8").exists());
    }

    #[tokio::test]
    async fn test_media_playlist_source() {
        let root = tempfile::tempdir().unwrap();
        let uri = "https://cdn.test/clip/index.m3u8";
        let transport = ScriptedTransport::new()
            .with_body(uri, media(&["s1.ts"]))
            .with_body("https://cdn.test/clip/s1.ts", "one");
        let options = MirrorOptions {
            filename: "index.m3u8".to_string(),
            ..options(root.path())
        };
        let mut mirror = Mirror::new(uri, options, Arc::new(transport)).unwrap();

        mirror.download().await.unwrap();
        assert!(mirror.available_renditions().is_empty());
        assert_eq!(fs::read(root.path().join("out/s1.ts")).unwrap(), b"one");
        assert_eq!(mirror.progress(), 1.0);
    }

    #[tokio::test]
    async fn test_media_source_with_missing_segment_fails_when_joining() {
        let root = tempfile::tempdir().unwrap();
        let uri = "https://cdn.test/clip/index.m3u8";
        let transport = ScriptedTransport::new()
            .with_body(uri, media(&["s1.ts", "s2.ts"]))
            .with_body("https://cdn.test/clip/s1.ts", "one")
            .fail_always("https://cdn.test/clip/s2.ts");
        let options = MirrorOptions {
            filename: "index.m3u8".to_string(),
            join: true,
            ..options(root.path())
        };
        let mut mirror = Mirror::new(uri, options, Arc::new(transport)).unwrap();

        let err = mirror.download().await.unwrap_err();
        assert!(matches!(err, Error::RunFailure(_)));
        assert!(!root.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_download_marks_live_playlist_finished() {
        let root = tempfile::tempdir().unwrap();
        let uri = "https://cdn.test/live/index.m3u8";
        let body = "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXT-X-MEDIA-SEQUENCE:7\n#EXTINF:10.0,\ns7.ts\n";
        let transport = ScriptedTransport::new()
            .with_body(uri, body)
            .with_body("https://cdn.test/live/s7.ts", "seven");
        let options = MirrorOptions {
            filename: "index.m3u8".to_string(),
            ..options(root.path())
        };
        let mut mirror = Mirror::new(uri, options, Arc::new(transport)).unwrap();

        mirror.download().await.unwrap();
        let saved = parse(&fs::read(root.path().join("out/index.m3u8")).unwrap()).unwrap();
        let media = saved.media().unwrap();
        assert!(media.end_list);
        assert_eq!(media.media_sequence, 7);
        assert_eq!(media.segments.len(), 1);
    }

    const AUDIO_MASTER: &str = "#EXTM3U
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",NAME=\"English\",URI=\"audio/en.m3u8\"
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",NAME=\"French\",URI=\"audio/fr.m3u8\"
#EXT-X-STREAM-INF:BANDWIDTH=500000
low/index.m3u8
";

    fn audio_transport(master: &'static str) -> ScriptedTransport {
        ScriptedTransport::new()
            .with_body(MASTER, master)
            .with_body("https://cdn.test/show/low/index.m3u8", media(&["a.ts"]))
            .with_body("https://cdn.test/show/low/a.ts", "la")
            .with_body("https://cdn.test/show/audio/en.m3u8", media(&["en1.aac"]))
            .with_body("https://cdn.test/show/audio/en1.aac", "en")
    }

    fn saved_alternatives(mirror: &Mirror) -> Vec<Option<String>> {
        let saved = parse(&fs::read(mirror.save_file_path()).unwrap()).unwrap();
        saved
            .master()
            .unwrap()
            .alternatives
            .iter()
            .map(|m| m.uri.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_failed_media_rendition_is_dropped() {
        let root = tempfile::tempdir().unwrap();
        let transport = audio_transport(AUDIO_MASTER).fail_always("https://cdn.test/show/audio/fr.m3u8");
        let mut mirror = Mirror::new(MASTER, options(root.path()), Arc::new(transport)).unwrap();

        mirror.download().await.unwrap();

        assert_eq!(saved_alternatives(&mirror), vec![Some("audio/en.m3u8".to_string())]);
        assert_eq!(saved_master(&mirror), vec!["low/index.m3u8"]);
        assert_eq!(fs::read(root.path().join("out/audio/en1.aac")).unwrap(), b"en");
        assert!(!root.path().join("out/audio/fr.m3u8").exists());
        assert_eq!(mirror.summary().renditions_dropped, 1);
    }

    #[tokio::test]
    async fn test_last_media_rendition_failure_fails_run() {
        let root = tempfile::tempdir().unwrap();
        let master = "#EXTM3U
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",NAME=\"English\",URI=\"audio/en.m3u8\"
#EXT-X-STREAM-INF:BANDWIDTH=500000
low/index.m3u8
";
        let transport = audio_transport(master).fail_always("https://cdn.test/show/audio/en1.aac");
        let mut mirror = Mirror::new(MASTER, options(root.path()), Arc::new(transport)).unwrap();

        let err = mirror.download().await.unwrap_err();
        assert!(matches!(err, Error::RunFailure(_)));
        assert!(!root.path().join("out").exists());
    }

    #[test]
    fn test_invalid_uri() {
        let result = Mirror::new("http://", MirrorOptions::default(), Arc::new(ScriptedTransport::new()));
        assert!(matches!(result, Err(Error::InvalidUri(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_recording_reloads_playlist() {
        let root = tempfile::tempdir().unwrap();
        let uri = "https://cdn.test/live/index.m3u8";
        let first = "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXT-X-MEDIA-SEQUENCE:1\n#EXTINF:10.0,\ns1.ts\n";
        let second = "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXT-X-MEDIA-SEQUENCE:1\n#EXTINF:10.0,\ns1.ts\n#EXTINF:10.0,\ns2.ts\n";
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_body(uri, first)
                .with_body("https://cdn.test/live/s1.ts", "one")
                .with_body("https://cdn.test/live/s2.ts", "two"),
        );

        let grower = transport.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(5)).await;
            grower.set_body(uri, second);
        });

        let options = MirrorOptions {
            filename: "index.m3u8".to_string(),
            ..options(root.path())
        };
        let mut mirror = Mirror::new(uri, options, transport.clone()).unwrap();
        mirror.download_live(Duration::from_secs(30)).await.unwrap();

        assert!(transport.requests(uri) >= 3);
        let saved = parse(&fs::read(root.path().join("out/index.m3u8")).unwrap()).unwrap();
        let media = saved.media().unwrap();
        assert_eq!(media.segments.len(), 2);
        assert!(media.end_list);
        assert_eq!(fs::read(root.path().join("out/s2.ts")).unwrap(), b"two");
        assert_eq!(mirror.progress(), 1.0);
    }
}
