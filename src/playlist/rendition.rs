//! Renditions listed by a master playlist.

use std::fmt;

use m3u8_rs::{AlternativeMedia, MasterPlaylist, VariantStream};
use serde::Serialize;

/// Tag a rendition is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RenditionKind {
    /// `EXT-X-STREAM-INF`
    Variant,
    /// `EXT-X-MEDIA`
    Media,
    /// `EXT-X-I-FRAME-STREAM-INF`
    IFrame,
}

impl RenditionKind {
    /// Traversal order used by every pass.
    pub const ORDER: [RenditionKind; 3] = [
        RenditionKind::Variant,
        RenditionKind::Media,
        RenditionKind::IFrame,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            RenditionKind::Variant => "EXT-X-STREAM-INF",
            RenditionKind::Media => "EXT-X-MEDIA",
            RenditionKind::IFrame => "EXT-X-I-FRAME-STREAM-INF",
        }
    }
}

impl fmt::Display for RenditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One selectable rendition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rendition {
    pub kind: RenditionKind,
    pub key: String,
    pub uri: Option<String>,
}

fn variant_kind(variant: &VariantStream) -> RenditionKind {
    if variant.is_i_frame {
        RenditionKind::IFrame
    } else {
        RenditionKind::Variant
    }
}

/// Stable key for a variant or I-frame stream.
pub fn variant_key(variant: &VariantStream) -> String {
    let kind = variant_kind(variant);
    let mut key = kind.tag().to_string();
    match kind {
        RenditionKind::Variant => {
            key.push_str(&format!("-bandwidth:{}", variant.bandwidth));
        }
        _ => {
            key.push_str(&format!("-URI:{}", variant.uri));
        }
    }
    if let Some(resolution) = &variant.resolution {
        key.push_str(&format!("-height:{}", resolution.height));
    }
    key
}

/// Stable key for an `EXT-X-MEDIA` entry.
pub fn media_key(media: &AlternativeMedia) -> String {
    let mut key = RenditionKind::Media.tag().to_string();
    key.push_str(&format!("-TYPE:{}", media.media_type));
    key.push_str(&format!("-NAME:{}", media.name));
    if let Some(channels) = &media.channels {
        key.push_str(&format!("-CHANNELS:{}", channels));
    }
    if let Some(uri) = &media.uri {
        key.push_str(&format!("-URI:{}", uri));
    }
    key
}

/// Every rendition of `master`, in traversal order.
pub fn renditions(master: &MasterPlaylist) -> Vec<Rendition> {
    let mut out = Vec::new();
    for kind in RenditionKind::ORDER {
        match kind {
            RenditionKind::Media => {
                out.extend(master.alternatives.iter().map(|media| Rendition {
                    kind,
                    key: media_key(media),
                    uri: media.uri.clone(),
                }));
            }
            _ => {
                out.extend(
                    master
                        .variants
                        .iter()
                        .filter(|v| variant_kind(v) == kind)
                        .map(|variant| Rendition {
                            kind,
                            key: variant_key(variant),
                            uri: Some(variant.uri.clone()),
                        }),
                );
            }
        }
    }
    out
}

/// Number of entries of `kind` left in `master`.
pub fn count(master: &MasterPlaylist, kind: RenditionKind) -> usize {
    match kind {
        RenditionKind::Media => master.alternatives.len(),
        _ => master.variants.iter().filter(|v| variant_kind(v) == kind).count(),
    }
}

/// Keep only the entries for which `keep(kind, key, uri)` holds.
pub fn retain<F>(master: &mut MasterPlaylist, mut keep: F)
where
    F: FnMut(RenditionKind, &str, Option<&str>) -> bool,
{
    master
        .variants
        .retain(|v| keep(variant_kind(v), &variant_key(v), Some(&v.uri)));
    master
        .alternatives
        .retain(|m| keep(RenditionKind::Media, &media_key(m), m.uri.as_deref()));
}

/// Rewrite the URI of every entry of `kind` through `relink`.
pub fn rewrite_uris<F>(master: &mut MasterPlaylist, kind: RenditionKind, mut relink: F)
where
    F: FnMut(&str) -> Option<String>,
{
    match kind {
        RenditionKind::Media => {
            for media in &mut master.alternatives {
                if let Some(new_uri) = media.uri.as_deref().and_then(&mut relink) {
                    media.uri = Some(new_uri);
                }
            }
        }
        _ => {
            for variant in master.variants.iter_mut().filter(|v| variant_kind(v) == kind) {
                if let Some(new_uri) = relink(&variant.uri) {
                    variant.uri = new_uri;
                }
            }
        }
    }
}
