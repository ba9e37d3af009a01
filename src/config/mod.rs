//! Configuration module for hls-mirror.
//!
//! This module handles:
//! - Loading configuration from TOML files
//! - Rendition selection modes
//! - Configuration validation

pub mod loader;
pub mod modes;
pub mod validation;

pub use loader::{Config, HttpConfig, OutputConfig, ProcessingConfig, SelectionConfig, SourceConfig};
pub use modes::SelectionMode;
pub use validation::validate_config;
