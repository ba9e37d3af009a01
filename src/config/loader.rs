//! Configuration structures and loading logic.

use crate::config::modes::SelectionMode;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub processing: ProcessingConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

/// What to mirror.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Master or media playlist URL (or local path).
    #[serde(default)]
    pub url: String,
}

/// Where and how mirrored files are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory of the local mirror.
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// File name of the mirrored master playlist.
    #[serde(default = "default_filename")]
    pub filename: String,

    /// Mode for created files.
    #[serde(default = "default_file_mode")]
    pub file_mode: u32,

    /// Mode for created directories.
    #[serde(default = "default_dir_mode")]
    pub dir_mode: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            filename: default_filename(),
            file_mode: default_file_mode(),
            dir_mode: default_dir_mode(),
        }
    }
}

/// Rendition selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Selection mode (all, better, list).
    #[serde(default)]
    pub mode: SelectionMode,

    /// Rendition keys kept in `list` mode.
    #[serde(default)]
    pub renditions: Vec<String>,
}

/// Segment processing options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Decrypt AES-128 segments while mirroring.
    #[serde(default)]
    pub decrypt: bool,

    /// Merge each rendition's segments into a single file.
    #[serde(default)]
    pub join_segments: bool,

    /// Resolve rounds per playlist before giving up on pending segments.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Concurrent segment requests per playlist.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Record a live playlist for this many minutes.
    #[serde(default)]
    pub live_minutes: Option<f64>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            decrypt: false,
            join_segments: false,
            max_attempts: default_max_attempts(),
            concurrency: default_concurrency(),
            live_minutes: None,
        }
    }
}

/// HTTP client options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whole-request timeout in seconds (0 disables it).
    #[serde(default)]
    pub timeout_seconds: u64,

    /// Connect timeout in seconds (0 disables it).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Cookies sent with every request.
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_seconds: 0,
            connect_timeout_seconds: default_connect_timeout(),
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
        }
    }
}

fn default_filename() -> String {
    "master.m3u8".to_string()
}

fn default_file_mode() -> u32 {
    0o644
}

fn default_dir_mode() -> u32 {
    0o777
}

fn default_max_attempts() -> u32 {
    5
}

fn default_concurrency() -> usize {
    5
}

fn default_connect_timeout() -> u64 {
    8
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64; rv:78.0) Gecko/20100101 Firefox/78.0".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!(
                    "Configuration file not found: {}. Create one from config.example.toml",
                    path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the effective output directory.
    pub fn output_directory(&self) -> PathBuf {
        self.output
            .directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("./"))
    }

    /// Whether a live recording window was requested.
    pub fn is_live(&self) -> bool {
        self.processing.live_minutes.is_some()
    }
}
