//! Aggregate progress and run statistics.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::download::queue::ProgressCallback;

#[derive(Default)]
struct Slots {
    master: f64,
    renditions: BTreeMap<usize, f64>,
    next_id: usize,
    /// Elapsed fraction of a live recording window, 1 otherwise.
    scale: f64,
    callback: Option<ProgressCallback>,
}

impl Slots {
    fn aggregate(&self) -> f64 {
        let raw = if self.renditions.is_empty() {
            self.master
        } else {
            self.renditions.values().sum::<f64>() / self.renditions.len() as f64
        };
        (raw * self.scale).clamp(0.0, 1.0)
    }
}

/// Combines per-node progress into one fraction for the caller.
///
/// The aggregate is the mean over rendition nodes, or the master node's
/// own progress when it has no renditions.
#[derive(Clone)]
pub struct ProgressTracker {
    slots: Arc<Mutex<Slots>>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                scale: 1.0,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_callback(&self, callback: ProgressCallback) {
        self.lock().callback = Some(callback);
    }

    /// Callback feeding the master node's progress.
    pub fn master_callback(&self) -> ProgressCallback {
        let tracker = self.clone();
        Arc::new(move |progress: f64| {
            tracker.lock().master = progress;
            tracker.emit();
        })
    }

    /// Register a rendition node; returns its slot id and the callback
    /// feeding it.
    pub fn register(&self) -> (usize, ProgressCallback) {
        let id = {
            let mut slots = self.lock();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.renditions.insert(id, 0.0);
            id
        };
        let tracker = self.clone();
        let callback: ProgressCallback = Arc::new(move |progress: f64| {
            if let Some(slot) = tracker.lock().renditions.get_mut(&id) {
                *slot = progress;
            }
            tracker.emit();
        });
        (id, callback)
    }

    /// Forget a dropped rendition.
    pub fn unregister(&self, id: usize) {
        self.lock().renditions.remove(&id);
    }

    /// Scale the aggregate by the elapsed share of a recording window.
    pub fn set_scale(&self, scale: f64) {
        self.lock().scale = scale.clamp(0.0, 1.0);
    }

    pub fn current(&self) -> f64 {
        self.lock().aggregate()
    }

    /// Report the current aggregate to the caller's callback.
    pub fn emit(&self) {
        let (value, callback) = {
            let slots = self.lock();
            (slots.aggregate(), slots.callback.clone())
        };
        if let Some(callback) = callback {
            callback(value);
        }
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub save_file: PathBuf,
    pub renditions: usize,
    pub renditions_dropped: usize,
    pub segments_ready: usize,
    pub segments_total: usize,
    pub duration_seconds: f64,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.segments_ready == self.segments_total
    }
}
