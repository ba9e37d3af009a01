//! Configuration validation logic.

use crate::config::loader::Config;
use crate::config::modes::SelectionMode;
use crate::error::{Error, Result};
use regex::Regex;

/// Highest permission bits accepted for file and directory modes.
const MAX_MODE: u32 = 0o7777;

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_source_url(&config.source.url)?;
    validate_modes(config.output.file_mode, config.output.dir_mode)?;
    validate_selection(config.selection.mode, &config.selection.renditions)?;
    validate_processing(config)?;

    Ok(())
}

/// Validate the source playlist location.
pub fn validate_source_url(url: &str) -> Result<()> {
    let url = url.trim();
    if url.is_empty() {
        return Err(Error::MissingConfig("source.url".to_string()));
    }

    if url.starts_with("http://") || url.starts_with("https://") {
        url::Url::parse(url).map_err(|e| Error::ConfigValidation {
            field: "source.url".to_string(),
            message: format!("Invalid playlist URL '{}': {}", url, e),
        })?;
        return Ok(());
    }

    let scheme_pattern = Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://").map_err(|e| {
        Error::Config(format!("Invalid scheme pattern: {}", e))
    })?;
    if scheme_pattern.is_match(url) {
        return Err(Error::ConfigValidation {
            field: "source.url".to_string(),
            message: format!("Unsupported scheme in '{}'. Use http(s) or a local path.", url),
        });
    }

    Ok(())
}

/// Validate file and directory permission modes.
pub fn validate_modes(file_mode: u32, dir_mode: u32) -> Result<()> {
    for (field, mode) in [("output.file_mode", file_mode), ("output.dir_mode", dir_mode)] {
        if mode > MAX_MODE {
            return Err(Error::ConfigValidation {
                field: field.to_string(),
                message: format!("Mode {:o} is not a valid permission mode", mode),
            });
        }
    }

    Ok(())
}

/// Validate rendition selection settings.
pub fn validate_selection<S: AsRef<str>>(mode: SelectionMode, renditions: &[S]) -> Result<()> {
    if mode != SelectionMode::List {
        return Ok(());
    }

    if renditions.is_empty() {
        return Err(Error::MissingConfig(
            "selection.renditions (at least one rendition key required in list mode)".to_string(),
        ));
    }

    let key_pattern = Regex::new(r"^EXT-X-(STREAM-INF|MEDIA|I-FRAME-STREAM-INF)(-|$)")
        .map_err(|e| Error::Config(format!("Invalid rendition key pattern: {}", e)))?;

    for key in renditions {
        let key = key.as_ref();
        if !key_pattern.is_match(key) {
            return Err(Error::ConfigValidation {
                field: "selection.renditions".to_string(),
                message: format!(
                    "Rendition key '{}' is not valid. Use --list to print the available keys.",
                    key
                ),
            });
        }
    }

    Ok(())
}

/// Validate processing limits.
fn validate_processing(config: &Config) -> Result<()> {
    if config.processing.max_attempts == 0 {
        return Err(Error::ConfigValidation {
            field: "processing.max_attempts".to_string(),
            message: "At least one attempt is required".to_string(),
        });
    }

    if config.processing.concurrency == 0 {
        return Err(Error::ConfigValidation {
            field: "processing.concurrency".to_string(),
            message: "Concurrency must be at least 1".to_string(),
        });
    }

    if let Some(minutes) = config.processing.live_minutes {
        if !minutes.is_finite() || minutes <= 0.0 {
            return Err(Error::ConfigValidation {
                field: "processing.live_minutes".to_string(),
                message: format!("Recording window must be positive (got {})", minutes),
            });
        }
    }

    Ok(())
}
