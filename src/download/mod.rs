//! Mirroring engine.
//!
//! This module provides:
//! - Segment units and their per-playlist queue
//! - Playlist nodes bound to the local mirror
//! - The orchestrator driving load/enqueue/resolve/close passes
//! - AES-128 decryption
//! - Progress aggregation

pub mod crypto;
pub mod mirror;
pub mod node;
pub mod queue;
pub mod segment;
pub mod state;

pub use mirror::{Mirror, MirrorOptions};
pub use node::{NodeOptions, PlaylistNode};
pub use queue::{ProgressCallback, SegmentQueue};
pub use segment::{Descriptor, SegmentKind, SegmentStatus, SegmentUnit};
pub use state::{ProgressTracker, RunSummary};
