//! Transport seam used by the mirroring engine.
//!
//! The engine only ever needs "GET this URL, optionally a byte range of it".
//! Everything else (connection pooling, TLS, cookies, timeouts) lives behind
//! the [`Transport`] trait so tests can script failures without a network.

pub mod http;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use http::HttpTransport;

/// Failure of a single GET.
///
/// The engine does not distinguish between variants: any of them reverts the
/// segment to pending and makes it a retry candidate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("GET {url} failed: {message}")]
    Request { url: String, message: String },
}

/// A byte range of a remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRequest {
    pub offset: u64,
    pub length: u64,
}

impl RangeRequest {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Value for the HTTP `Range` header (inclusive end).
    pub fn header_value(&self) -> String {
        let end = self.offset.saturating_add(self.length).saturating_sub(1);
        format!("bytes={}-{}", self.offset, end)
    }

    /// Cut this range out of a full body, for servers that ignore `Range`.
    pub fn slice(&self, body: Bytes) -> Bytes {
        let len = body.len() as u64;
        let start = self.offset.min(len) as usize;
        let end = self.offset.saturating_add(self.length).min(len) as usize;
        body.slice(start..end)
    }
}

/// Something able to issue GET requests.
///
/// Implementations must tolerate at least five concurrent in-flight calls.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, range: Option<RangeRequest>) -> Result<Bytes, TransportError>;
}
