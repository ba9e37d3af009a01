//! Command-line argument definitions using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::{Config, SelectionMode};

/// HLS mirroring CLI.
#[derive(Parser, Debug)]
#[command(
    name = "hls-mirror",
    version,
    about = "Mirror an HLS stream to local storage",
    long_about = "Download a master or media playlist with every selected rendition and segment, \
                  rewriting the playlists so the local copy plays on its own.\n\n\
                  Supports AES-128 decryption, segment joining and recording live streams."
)]
pub struct Args {
    /// Master or media playlist URL (or local path).
    #[arg(env = "HLS_MIRROR_URL")]
    pub url: Option<String>,

    /// Root directory of the local mirror.
    #[arg(short = 'd', long = "directory")]
    pub directory: Option<PathBuf>,

    /// File name of the mirrored master playlist.
    #[arg(short = 'f', long)]
    pub filename: Option<String>,

    /// Rendition selection mode.
    #[arg(long, value_enum)]
    pub mode: Option<SelectionModeArg>,

    /// Rendition key to keep (repeatable, implies --mode list).
    #[arg(short = 'r', long = "rendition")]
    pub renditions: Vec<String>,

    /// Decrypt AES-128 segments.
    #[arg(long)]
    pub decrypt: bool,

    /// Merge each playlist's segments into one file.
    #[arg(long)]
    pub join: bool,

    /// Record a live stream for this many minutes.
    #[arg(long, value_name = "MINUTES")]
    pub live: Option<f64>,

    /// Fetch rounds per playlist before giving up on a segment.
    #[arg(long)]
    pub attempts: Option<u32>,

    /// Concurrent segment requests per playlist.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Extra request header, as "Name: value" (repeatable).
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// User agent sent with every request.
    #[arg(short = 'a', long = "user-agent", env = "HLS_MIRROR_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Path to configuration file.
    #[arg(short, long, default_value = "hls-mirror.toml")]
    pub config: PathBuf,

    /// List the available renditions and exit.
    #[arg(long)]
    pub list: bool,

    /// Print the rendition list as JSON.
    #[arg(long, requires = "list")]
    pub json: bool,

    /// Hide the progress bar.
    #[arg(long, short)]
    pub quiet: bool,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

/// CLI selection mode argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SelectionModeArg {
    /// Mirror every rendition.
    All,
    /// Mirror only the highest-bandwidth variant.
    Better,
    /// Mirror the renditions given with --rendition.
    List,
}

impl From<SelectionModeArg> for SelectionMode {
    fn from(arg: SelectionModeArg) -> Self {
        match arg {
            SelectionModeArg::All => SelectionMode::All,
            SelectionModeArg::Better => SelectionMode::Better,
            SelectionModeArg::List => SelectionMode::List,
        }
    }
}

fn parse_header(value: &str) -> Result<(String, String), String> {
    let (name, content) = value
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got {:?}", value))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in {:?}", value));
    }
    Ok((name.to_string(), content.trim().to_string()))
}

impl Args {
    /// Merge CLI arguments into an existing config, overriding where specified.
    pub fn merge_into_config(self, config: &mut Config) {
        if let Some(url) = self.url {
            config.source.url = url;
        }

        if let Some(dir) = self.directory {
            config.output.directory = Some(dir);
        }

        if let Some(filename) = self.filename {
            config.output.filename = filename;
        }

        if let Some(mode) = self.mode {
            config.selection.mode = mode.into();
        }

        // Explicit keys only make sense in list mode
        if !self.renditions.is_empty() {
            config.selection.mode = SelectionMode::List;
            config.selection.renditions = self.renditions;
        }

        // Boolean flags (only override if set to non-default)
        if self.decrypt {
            config.processing.decrypt = true;
        }

        if self.join {
            config.processing.join_segments = true;
        }

        if let Some(minutes) = self.live {
            config.processing.live_minutes = Some(minutes);
        }

        if let Some(attempts) = self.attempts {
            config.processing.max_attempts = attempts;
        }

        if let Some(concurrency) = self.concurrency {
            config.processing.concurrency = concurrency;
        }

        if let Some(user_agent) = self.user_agent {
            config.http.user_agent = user_agent;
        }

        config.http.headers.extend(self.headers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overrides_config() {
        let args = Args::try_parse_from([
            "hls-mirror",
            "https://cdn.example.com/master.m3u8",
            "-d",
            "out",
            "-r",
            "EXT-X-STREAM-INF-bandwidth:500000",
            "--decrypt",
            "--live",
            "2.5",
            "-H",
            "Referer: https://example.com/",
        ])
        .unwrap();

        let mut config = Config::default();
        args.merge_into_config(&mut config);

        assert_eq!(config.source.url, "https://cdn.example.com/master.m3u8");
        assert_eq!(config.output.directory, Some(PathBuf::from("out")));
        assert_eq!(config.selection.mode, SelectionMode::List);
        assert_eq!(config.selection.renditions.len(), 1);
        assert!(config.processing.decrypt);
        assert!(!config.processing.join_segments);
        assert_eq!(config.processing.live_minutes, Some(2.5));
        assert_eq!(
            config.http.headers.get("Referer").map(String::as_str),
            Some("https://example.com/")
        );
    }

    #[test]
    fn test_defaults_leave_config_alone() {
        let args = Args::try_parse_from(["hls-mirror", "--mode", "better"]).unwrap();
        let mut config = Config::default();
        config.source.url = "https://cdn.example.com/a.m3u8".into();
        args.merge_into_config(&mut config);

        assert_eq!(config.source.url, "https://cdn.example.com/a.m3u8");
        assert_eq!(config.selection.mode, SelectionMode::Better);
        assert_eq!(config.processing.max_attempts, 5);
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("X-Token:  abc ").unwrap(),
            ("X-Token".to_string(), "abc".to_string())
        );
        assert!(parse_header("no colon").is_err());
        assert!(parse_header(": value").is_err());
        assert!(Args::try_parse_from(["hls-mirror", "--json"]).is_err());
    }
}
