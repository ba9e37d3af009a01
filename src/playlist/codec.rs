//! M3U8 text codec.
//!
//! Thin layer over `m3u8-rs`: the engine never looks at playlist text, only
//! at the parsed [`Playlist`].

use m3u8_rs::{MasterPlaylist, MediaPlaylist};

use crate::error::{Error, Result};

/// Default polling interval when a playlist does not declare durations.
pub const DEFAULT_SEGMENT_SECONDS: f64 = 10.0;

/// A parsed playlist, either master (renditions) or media (segments).
#[derive(Debug, Clone, PartialEq)]
pub enum Playlist {
    Master(MasterPlaylist),
    Media(MediaPlaylist),
}

impl Playlist {
    pub fn is_master(&self) -> bool {
        matches!(self, Playlist::Master(_))
    }

    pub fn master(&self) -> Option<&MasterPlaylist> {
        match self {
            Playlist::Master(master) => Some(master),
            Playlist::Media(_) => None,
        }
    }

    pub fn master_mut(&mut self) -> Option<&mut MasterPlaylist> {
        match self {
            Playlist::Master(master) => Some(master),
            Playlist::Media(_) => None,
        }
    }

    pub fn media(&self) -> Option<&MediaPlaylist> {
        match self {
            Playlist::Media(media) => Some(media),
            Playlist::Master(_) => None,
        }
    }

    pub fn media_mut(&mut self) -> Option<&mut MediaPlaylist> {
        match self {
            Playlist::Media(media) => Some(media),
            Playlist::Master(_) => None,
        }
    }

    /// Whether the playlist has media segments of its own.
    pub fn has_segments(&self) -> bool {
        self.media().map(|m| !m.segments.is_empty()).unwrap_or(false)
    }

    /// Declared duration of the first media segment, if positive.
    pub fn first_segment_duration(&self) -> Option<f64> {
        self.media()
            .and_then(|m| m.segments.first())
            .map(|s| s.duration as f64)
            .filter(|d| *d > 0.0)
    }
}

/// Parse playlist bytes.
pub fn parse(bytes: &[u8]) -> Result<Playlist> {
    match m3u8_rs::parse_playlist_res(bytes) {
        Ok(m3u8_rs::Playlist::MasterPlaylist(master)) => Ok(Playlist::Master(master)),
        Ok(m3u8_rs::Playlist::MediaPlaylist(media)) => Ok(Playlist::Media(media)),
        Err(e) => Err(Error::Playlist(format!("Failed to parse playlist: {:?}", e))),
    }
}

/// Serialize a playlist back to M3U8 text.
pub fn serialize(playlist: &Playlist) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let written = match playlist {
        Playlist::Master(master) => master.write_to(&mut out),
        Playlist::Media(media) => media.write_to(&mut out),
    };
    written.map_err(|e| Error::Playlist(format!("Failed to serialize playlist: {}", e)))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEDIA: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:6
#EXT-X-MEDIA-SEQUENCE:10
#EXTINF:6.0,
seg10.ts
#EXTINF:5.5,
seg11.ts
#EXT-X-ENDLIST
";

    const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=500000
low/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=1200000
high/index.m3u8
";

    #[test]
    fn test_parse_media() {
        let playlist = parse(MEDIA.as_bytes()).unwrap();
        assert!(!playlist.is_master());
        let media = playlist.media().unwrap();
        assert_eq!(media.media_sequence, 10);
        assert_eq!(media.segments.len(), 2);
        assert!(media.end_list);
        assert_eq!(playlist.first_segment_duration(), Some(6.0));
    }

    #[test]
    fn test_parse_master() {
        let playlist = parse(MASTER.as_bytes()).unwrap();
        assert!(playlist.is_master());
        assert!(!playlist.has_segments());
        assert_eq!(playlist.master().unwrap().variants.len(), 2);
        assert_eq!(playlist.first_segment_duration(), None);
    }

    #[test]
    fn test_serialize_keeps_segments() {
        let playlist = parse(MEDIA.as_bytes()).unwrap();
        let text = String::from_utf8(serialize(&playlist).unwrap()).unwrap();
        assert!(text.contains("seg10.ts"));
        assert!(text.contains("#EXT-X-MEDIA-SEQUENCE:10"));
        assert!(text.contains("#EXT-X-ENDLIST"));

        let reparsed = parse(text.as_bytes()).unwrap();
        assert_eq!(reparsed.media().unwrap().segments.len(), 2);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse(b"not a playlist"), Err(Error::Playlist(_))));
    }
}
