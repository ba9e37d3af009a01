//! In-memory transport with scripted failures.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use super::{RangeRequest, Transport, TransportError};

#[derive(Default)]
struct Script {
    bodies: HashMap<String, Bytes>,
    failures: HashMap<String, usize>,
    requests: HashMap<String, usize>,
}

/// Serves fixed bodies by URL; unknown URLs answer 404.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(self, url: &str, body: impl Into<Bytes>) -> Self {
        self.set_body(url, body);
        self
    }

    /// Answer 503 to the next `times` requests for `url`.
    pub fn fail_times(self, url: &str, times: usize) -> Self {
        self.script.lock().unwrap().failures.insert(url.to_string(), times);
        self
    }

    pub fn fail_always(self, url: &str) -> Self {
        self.fail_times(url, usize::MAX)
    }

    /// Replace a body, e.g. to grow a live playlist.
    pub fn set_body(&self, url: &str, body: impl Into<Bytes>) {
        self.script
            .lock()
            .unwrap()
            .bodies
            .insert(url.to_string(), body.into());
    }

    pub fn requests(&self, url: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .requests
            .get(url)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, range: Option<RangeRequest>) -> Result<Bytes, TransportError> {
        let mut script = self.script.lock().unwrap();
        *script.requests.entry(url.to_string()).or_insert(0) += 1;

        if let Some(remaining) = script.failures.get_mut(url) {
            if *remaining > 0 {
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
                return Err(TransportError::Status {
                    url: url.to_string(),
                    status: 503,
                });
            }
        }

        match script.bodies.get(url) {
            Some(body) => Ok(match range {
                Some(range) => range.slice(body.clone()),
                None => body.clone(),
            }),
            None => Err(TransportError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
