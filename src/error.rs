//! Error types for the hls-mirror application.

use std::path::PathBuf;

use thiserror::Error;

use crate::transport::TransportError;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    // Path resolution errors
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    // Transport errors that escaped the retry loop (playlist and key fetches)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // Playlist codec errors
    #[error("Playlist error: {0}")]
    Playlist(String),

    // Destination directory cannot be created or written
    #[error("Unable to use folder {}: {message}", path.display())]
    Folder { path: PathBuf, message: String },

    // Merge of segment files failed
    #[error("Join error: {0}")]
    Join(String),

    #[error("Decryption error: {0}")]
    Decrypt(String),

    // The last rendition of a tag type (or the master itself) failed
    #[error("Run failed: {0}")]
    RunFailure(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // URL parsing errors
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a folder error for `path`.
    pub fn folder(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Folder {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Process exit codes.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const TRANSPORT_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const DOWNLOAD_ERROR: i32 = 4;
    pub const UNEXPECTED_ERROR: i32 = 5;
}
