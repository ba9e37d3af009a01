//! hls-mirror - mirror HTTP Live Streaming playlists to local storage
//!
//! This library downloads a master or media playlist together with its
//! renditions and segments and writes a self-contained local copy.
//!
//! # Features
//!
//! - Rendition selection (all, highest bandwidth, explicit list)
//! - Concurrent segment fetching with retry rounds
//! - AES-128 decryption
//! - Joining segments into a single file per playlist
//! - Recording live playlists for a fixed window
//! - Rollback of everything a failed run created
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use hls_mirror::{Config, HttpTransport, Mirror, MirrorOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Path::new("hls-mirror.toml"))?;
//!     let transport = Arc::new(HttpTransport::new(&config.http)?);
//!     let mut mirror = Mirror::connect(
//!         &config.source.url,
//!         MirrorOptions::from_config(&config),
//!         transport,
//!     )
//!     .await?;
//!     mirror.download().await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod dedup;
pub mod download;
pub mod error;
pub mod fs;
pub mod output;
pub mod playlist;
pub mod transport;

// Re-exports for convenience
pub use config::{Config, SelectionMode};
pub use download::{Mirror, MirrorOptions, RunSummary};
pub use error::{Error, Result};
pub use playlist::{Rendition, RenditionKind, RenditionSelector};
pub use transport::{HttpTransport, Transport, TransportError};
