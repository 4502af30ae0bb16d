use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::Fetcher;
use crate::core::{RawPayload, StreamWindow};
use crate::error::{CaptureError, CaptureResult};

/// Agent client over HTTP.
///
/// Only connection establishment is time-bounded; a connected request that
/// never answers blocks the caller.
pub struct HttpFetcher {
    http: reqwest::Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            http,
            base_url: normalize_base_url(base_url),
        })
    }

    async fn get(&self, path: &str) -> CaptureResult<RawPayload> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| CaptureError::Unreachable {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "agent returned non-success status");
        }

        // A body cut off mid-read surfaces as a header failure downstream,
        // which the polling loop retries.
        match response.bytes().await {
            Ok(body) => {
                debug!(%url, bytes = body.len(), "fetched");
                Ok(RawPayload::from_bytes(&body))
            }
            Err(e) => {
                warn!(%url, error = %e, "response body could not be read");
                Ok(RawPayload::empty())
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn current(&self) -> CaptureResult<RawPayload> {
        self.get("current").await
    }

    async fn sample(&self, window: &StreamWindow) -> CaptureResult<RawPayload> {
        self.get(&window.sample_path()).await
    }

    async fn sample_count(&self, from: u64, count: u64) -> CaptureResult<RawPayload> {
        self.get(&format!("sample?from={from}&count={count}")).await
    }
}

fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        assert_eq!(normalize_base_url("http://localhost:5000"), "http://localhost:5000/");
        assert_eq!(normalize_base_url("http://localhost:5000/"), "http://localhost:5000/");
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        // Bind then drop a listener so the port is known to be closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let fetcher = HttpFetcher::new(&format!("http://127.0.0.1:{port}"), Duration::from_secs(2)).unwrap();

        let err = fetcher.current().await.unwrap_err();
        match err {
            CaptureError::Unreachable { url, .. } => assert!(url.ends_with("/current")),
            other => panic!("expected Unreachable, got {other:?}"),
        }
    }
}
