//! HTTP transport backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, StatusCode};

use crate::config::HttpConfig;
use crate::error::{Error, Result};
use crate::transport::{RangeRequest, Transport, TransportError};

/// Browser-like headers sent with every request.
const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US;q=0.5,en;q=0.3";

/// reqwest-based [`Transport`].
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a client from the `[http]` configuration section.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let headers = build_headers(config)?;

        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .cookie_store(true);

        if config.connect_timeout_seconds > 0 {
            builder = builder.connect_timeout(Duration::from_secs(config.connect_timeout_seconds));
        }
        if config.timeout_seconds > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_seconds));
        }

        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

/// Build the default header map, including configured extras and cookies.
fn build_headers(config: &HttpConfig) -> Result<header::HeaderMap> {
    let mut headers = header::HeaderMap::new();

    headers.insert(header::ACCEPT, header::HeaderValue::from_static(DEFAULT_ACCEPT));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        header::HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE),
    );
    headers.insert(header::PRAGMA, header::HeaderValue::from_static("no-cache"));
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-cache"),
    );

    for (name, value) in &config.headers {
        let name = header::HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            Error::ConfigValidation {
                field: "http.headers".to_string(),
                message: format!("Invalid header name '{}': {}", name, e),
            }
        })?;
        let value = header::HeaderValue::from_str(value).map_err(|e| Error::ConfigValidation {
            field: "http.headers".to_string(),
            message: format!("Invalid value for header '{}': {}", name, e),
        })?;
        headers.insert(name, value);
    }

    if !config.cookies.is_empty() {
        let cookie = config
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        let value = header::HeaderValue::from_str(&cookie).map_err(|e| Error::ConfigValidation {
            field: "http.cookies".to_string(),
            message: format!("Invalid cookie value: {}", e),
        })?;
        headers.insert(header::COOKIE, value);
    }

    Ok(headers)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, range: Option<RangeRequest>) -> std::result::Result<Bytes, TransportError> {
        let mut request = self.client.get(url);
        if let Some(range) = range {
            tracing::debug!("GET {} ({})", url, range.header_value());
            request = request.header(header::RANGE, range.header_value());
        } else {
            tracing::debug!("GET {}", url);
        }

        let response = request.send().await.map_err(|e| TransportError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        tracing::debug!("Response status: {}", status);

        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| TransportError::Request {
            url: url.to_string(),
            message: format!("Failed to read body: {}", e),
        })?;

        // A 200 answer to a ranged request carries the whole resource.
        match range {
            Some(range) if status != StatusCode::PARTIAL_CONTENT => Ok(range.slice(body)),
            _ => Ok(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_build_headers_includes_cookies_and_extras() {
        let mut config = HttpConfig::default();
        config.headers = BTreeMap::from([("Referer".to_string(), "https://example.com/".to_string())]);
        config.cookies = BTreeMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]);

        let headers = build_headers(&config).unwrap();
        assert_eq!(headers.get("referer").unwrap(), "https://example.com/");
        assert_eq!(headers.get(header::COOKIE).unwrap(), "a=1; b=2");
        assert_eq!(headers.get(header::PRAGMA).unwrap(), "no-cache");
    }

    #[test]
    fn test_build_headers_rejects_bad_name() {
        let mut config = HttpConfig::default();
        config.headers = BTreeMap::from([("bad header".to_string(), "x".to_string())]);
        assert!(build_headers(&config).is_err());
    }
}
