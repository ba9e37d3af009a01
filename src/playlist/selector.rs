//! Rendition selection for master playlists.

use std::collections::HashSet;

use m3u8_rs::MasterPlaylist;

use crate::config::{SelectionConfig, SelectionMode};
use crate::playlist::rendition::{renditions, retain, Rendition};

/// Decides which renditions of a master playlist get mirrored.
#[derive(Debug, Clone, Default)]
pub struct RenditionSelector {
    mode: SelectionMode,
    keys: HashSet<String>,
}

impl RenditionSelector {
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            keys: HashSet::new(),
        }
    }

    /// Select an explicit list of rendition keys (switches to `list` mode).
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: SelectionMode::List,
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &SelectionConfig) -> Self {
        match config.mode {
            SelectionMode::List => Self::with_keys(config.renditions.iter().cloned()),
            mode => Self::new(mode),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SelectionMode) {
        self.mode = mode;
    }

    /// Renditions a caller can choose from.
    pub fn available(&self, master: &MasterPlaylist) -> Vec<Rendition> {
        renditions(master)
    }

    /// Drop the renditions that are not selected, in place.
    ///
    /// Returns the number of renditions left.
    pub fn filter(&self, master: &mut MasterPlaylist) -> usize {
        match self.mode {
            SelectionMode::All => {}
            SelectionMode::List => {
                retain(master, |_, key, _| self.keys.contains(key));
            }
            SelectionMode::Better => {
                let best = master
                    .variants
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| !v.is_i_frame)
                    .fold(None::<(usize, u64)>, |best, (index, v)| match best {
                        Some((_, bandwidth)) if bandwidth >= v.bandwidth => best,
                        _ => Some((index, v.bandwidth)),
                    })
                    .map(|(index, _)| index);

                let mut index = 0;
                master.variants.retain(|_| {
                    let keep = Some(index) == best;
                    index += 1;
                    keep
                });
                master.alternatives.clear();
            }
        }

        let remaining = renditions(master).len();
        tracing::debug!("{} rendition(s) selected ({} mode)", remaining, self.mode);
        remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::codec::parse;

    const MASTER: &str = "#EXTM3U
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",NAME=\"English\",URI=\"audio/en.m3u8\"
#EXT-X-STREAM-INF:BANDWIDTH=500000
low/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=1200000
high/index.m3u8
#EXT-X-I-FRAME-STREAM-INF:BANDWIDTH=90000,URI=\"iframe/index.m3u8\"
";

    fn master() -> MasterPlaylist {
        parse(MASTER.as_bytes()).unwrap().master().unwrap().clone()
    }

    fn keys(master: &MasterPlaylist) -> Vec<String> {
        renditions(master).into_iter().map(|r| r.key).collect()
    }

    #[test]
    fn test_all_keeps_everything() {
        let mut master = master();
        assert_eq!(RenditionSelector::new(SelectionMode::All).filter(&mut master), 4);
    }

    #[test]
    fn test_better_keeps_highest_bandwidth_only() {
        let mut master = master();
        let selector = RenditionSelector::new(SelectionMode::Better);
        assert_eq!(selector.filter(&mut master), 1);
        assert_eq!(keys(&master), vec!["EXT-X-STREAM-INF-bandwidth:1200000"]);
    }

    #[test]
    fn test_list_keeps_named_keys() {
        let mut master = master();
        let selector = RenditionSelector::with_keys([
            "EXT-X-STREAM-INF-bandwidth:500000",
            "EXT-X-MEDIA-TYPE:AUDIO-NAME:English-URI:audio/en.m3u8",
        ]);
        assert_eq!(selector.mode(), SelectionMode::List);
        assert_eq!(selector.filter(&mut master), 2);
        assert_eq!(
            keys(&master),
            vec![
                "EXT-X-STREAM-INF-bandwidth:500000",
                "EXT-X-MEDIA-TYPE:AUDIO-NAME:English-URI:audio/en.m3u8",
            ]
        );
    }

    #[test]
    fn test_from_config() {
        let config = SelectionConfig {
            mode: SelectionMode::List,
            renditions: vec!["EXT-X-STREAM-INF-bandwidth:500000".to_string()],
        };
        let mut master = master();
        assert_eq!(RenditionSelector::from_config(&config).filter(&mut master), 1);

        let config = SelectionConfig {
            mode: SelectionMode::Better,
            renditions: Vec::new(),
        };
        assert_eq!(RenditionSelector::from_config(&config).mode(), SelectionMode::Better);
    }

    #[test]
    fn test_list_with_unknown_keys_drops_all() {
        let mut master = master();
        let selector = RenditionSelector::with_keys(["EXT-X-STREAM-INF-bandwidth:1"]);
        assert_eq!(selector.filter(&mut master), 0);
        assert!(renditions(&master).is_empty());
    }
}
