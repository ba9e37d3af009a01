//! One downloadable item of a media playlist.

use std::fmt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use m3u8_rs::{ByteRange, Map, MediaSegment};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::dedup::content_key;
use crate::download::crypto::{decrypt, DecryptParams};
use crate::error::{Error, Result};
use crate::fs::is_remote;
use crate::transport::RangeRequest;

/// Lifecycle of a [`SegmentUnit`].
///
/// `Pending -> Processing -> Ready`, with `Processing -> Pending` when a
/// fetch fails. Nothing leaves `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStatus {
    Pending,
    Processing,
    Ready,
}

/// Whether a unit is a media segment or the initialization segment priming it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Media,
    Init,
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentKind::Media => write!(f, "segment"),
            SegmentKind::Init => write!(f, "init segment"),
        }
    }
}

/// Playlist entry a unit was built from, rewritten when the playlist is saved.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    /// A media segment; its `map` is always detached into its own unit.
    Media(MediaSegment),
    /// An `EXT-X-MAP` initialization segment.
    Init(Map),
}

impl Descriptor {
    pub fn kind(&self) -> SegmentKind {
        match self {
            Descriptor::Media(_) => SegmentKind::Media,
            Descriptor::Init(_) => SegmentKind::Init,
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            Descriptor::Media(segment) => &segment.uri,
            Descriptor::Init(map) => &map.uri,
        }
    }

    pub fn byte_range(&self) -> Option<&ByteRange> {
        match self {
            Descriptor::Media(segment) => segment.byte_range.as_ref(),
            Descriptor::Init(map) => map.byte_range.as_ref(),
        }
    }

    /// Point the entry at a new location.
    pub fn relocate(&mut self, uri: String, byte_range: Option<ByteRange>) {
        match self {
            Descriptor::Media(segment) => {
                segment.uri = uri;
                segment.byte_range = byte_range;
            }
            Descriptor::Init(map) => {
                map.uri = uri;
                map.byte_range = byte_range;
            }
        }
    }
}

/// A media or initialization segment bound to its local destination.
#[derive(Debug, Clone)]
pub struct SegmentUnit {
    /// Absolute URL or local path the bytes come from.
    pub source_uri: String,
    pub local_path: PathBuf,
    pub offset: Option<u64>,
    pub length: Option<u64>,
    pub decrypt: Option<DecryptParams>,
    /// Init segments sit at `n - 0.5`, just before the segment they prime.
    pub sequence: f64,
    pub status: SegmentStatus,
    pub descriptor: Descriptor,
}

impl SegmentUnit {
    pub fn new(
        descriptor: Descriptor,
        source_uri: impl Into<String>,
        local_path: impl Into<PathBuf>,
        sequence: f64,
    ) -> Self {
        Self {
            source_uri: source_uri.into(),
            local_path: local_path.into(),
            offset: None,
            length: None,
            decrypt: None,
            sequence,
            status: SegmentStatus::Pending,
            descriptor,
        }
    }

    pub fn with_range(mut self, offset: u64, length: u64) -> Self {
        self.offset = Some(offset);
        self.length = Some(length);
        self
    }

    pub fn with_decrypt(mut self, params: Option<DecryptParams>) -> Self {
        self.decrypt = params;
        self
    }

    pub fn kind(&self) -> SegmentKind {
        self.descriptor.kind()
    }

    pub fn is_ready(&self) -> bool {
        self.status == SegmentStatus::Ready
    }

    pub fn is_pending(&self) -> bool {
        self.status == SegmentStatus::Pending
    }

    /// Whether the source is a local file rather than an HTTP(S) URL.
    pub fn is_local(&self) -> bool {
        !is_remote(&self.source_uri)
    }

    /// Cache key identifying the fetched bytes.
    pub fn content_key(&self) -> String {
        content_key(&self.source_uri, self.offset, self.length)
    }

    pub fn range_request(&self) -> Option<RangeRequest> {
        match (self.offset, self.length) {
            (Some(offset), Some(length)) => Some(RangeRequest::new(offset, length)),
            _ => None,
        }
    }

    /// Declared duration in seconds, never negative.
    pub fn duration(&self) -> f64 {
        match &self.descriptor {
            Descriptor::Media(segment) => (segment.duration as f64).max(0.0),
            Descriptor::Init(_) => 0.0,
        }
    }

    /// Read the source bytes from the local filesystem.
    pub async fn read_local(&self) -> Result<Bytes> {
        let data = Bytes::from(tokio::fs::read(&self.source_uri).await?);
        Ok(match self.range_request() {
            Some(range) => range.slice(data),
            None => data,
        })
    }

    /// Decrypt fetched bytes when the unit is keyed.
    pub fn prepare(&self, data: &[u8]) -> Result<Vec<u8>> {
        match &self.decrypt {
            Some(params) => decrypt(data, &params.key, &params.iv_for(self.sequence)),
            None => Ok(data.to_vec()),
        }
    }

    /// Write bytes to the destination, at the byte offset when there is one.
    ///
    /// The file must already exist.
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&self.local_path)
            .await
            .map_err(|e| folder_error(&self.local_path, e))?;

        match self.offset {
            Some(offset) => {
                file.seek(SeekFrom::Start(offset)).await?;
            }
            None => {
                file.set_len(0).await?;
            }
        }
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }
}

fn folder_error(path: &Path, e: std::io::Error) -> Error {
    Error::folder(path.parent().unwrap_or(path), e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::crypto::sequence_iv;
    use cbc::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};

    fn media(uri: &str, duration: f32) -> Descriptor {
        Descriptor::Media(MediaSegment {
            uri: uri.to_string(),
            duration,
            ..Default::default()
        })
    }

    #[test]
    fn test_duration_is_clamped() {
        let unit = SegmentUnit::new(media("a.ts", -3.0), "https://h.example.com/a.ts", "a.ts", 1.0);
        assert_eq!(unit.duration(), 0.0);

        let unit = SegmentUnit::new(media("a.ts", 4.5), "https://h.example.com/a.ts", "a.ts", 1.0);
        assert_eq!(unit.duration(), 4.5);

        let init = Descriptor::Init(Map {
            uri: "init.mp4".into(),
            ..Default::default()
        });
        let unit = SegmentUnit::new(init, "https://h.example.com/init.mp4", "init.mp4", 0.5);
        assert_eq!(unit.kind(), SegmentKind::Init);
        assert_eq!(unit.duration(), 0.0);
    }

    #[test]
    fn test_content_key_includes_range() {
        let plain = SegmentUnit::new(media("a.ts", 1.0), "https://h.example.com/a.ts", "a.ts", 1.0);
        let ranged = plain.clone().with_range(0, 100);
        assert_ne!(plain.content_key(), ranged.content_key());
        assert_eq!(ranged.range_request(), Some(RangeRequest::new(0, 100)));
        assert!(plain.range_request().is_none());
        assert!(!plain.is_local());
    }

    #[test]
    fn test_prepare_decrypts_with_sequence_iv() {
        let key = *b"fedcba9876543210";
        let cipher = cbc::Encryptor::<aes::Aes128>::new(&key.into(), &sequence_iv(5.0).into())
            .encrypt_padded_vec_mut::<Pkcs7>(b"payload");

        let unit = SegmentUnit::new(media("a.ts", 1.0), "https://h.example.com/a.ts", "a.ts", 5.0)
            .with_decrypt(Some(DecryptParams { key, iv: None }));
        assert_eq!(unit.prepare(&cipher).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_write_at_offset_and_read_local() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.ts");
        std::fs::write(&source, b"0123456789").unwrap();
        let dest = dir.path().join("dest.ts");
        std::fs::write(&dest, b"").unwrap();

        let source_uri = source.to_string_lossy().into_owned();
        let head = SegmentUnit::new(media("source.ts", 1.0), source_uri.clone(), &dest, 0.0).with_range(0, 4);
        let tail = SegmentUnit::new(media("source.ts", 1.0), source_uri, &dest, 1.0).with_range(4, 6);
        assert!(head.is_local());

        let data = tail.read_local().await.unwrap();
        assert_eq!(&data[..], b"456789");
        tail.write(&data).await.unwrap();
        let data = head.read_local().await.unwrap();
        head.write(&data).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"0123456789");
    }

    #[test]
    fn test_relocate_descriptor() {
        let mut descriptor = media("https://h.example.com/a.ts", 2.0);
        descriptor.relocate(
            "_merged.ts".into(),
            Some(ByteRange {
                length: 10,
                offset: Some(20),
            }),
        );
        assert_eq!(descriptor.uri(), "_merged.ts");
        assert_eq!(descriptor.byte_range().and_then(|r| r.offset), Some(20));
    }
}
