//! Trusted remote source.
//!
//! Dereferences `https://` URIs against a single trusted host. Requests
//! are retried with exponential backoff on 500/502/503/504, and a 200
//! carrying a `Refresh` header is treated as "content not ready yet":
//! wait the indicated number of seconds and fetch again.

use std::time::Duration;

use canon_core::domain::uri::Scheme;
use canon_core::domain::Uri;
use canon_core::errors::{SourceError, SourceResult};
use canon_core::store::{LazyReader, Source};

const RETRYABLE: [u16; 4] = [500, 502, 503, 504];

/// Retrieves content from a trusted remote host.
pub struct RemoteSource {
    client: reqwest::blocking::Client,
    trusted_host: String,
    trusted_scheme: Scheme,
    retries: u32,
    backoff: Duration,
}

impl RemoteSource {
    pub fn new(trusted_host: impl Into<String>) -> Self {
        RemoteSource {
            client: reqwest::blocking::Client::new(),
            trusted_host: trusted_host.into(),
            trusted_scheme: Scheme::Https,
            retries: 3,
            backoff: Duration::from_secs(2),
        }
    }

    /// Allow plain http; only meant for tests against local fixtures.
    pub fn insecure(mut self) -> Self {
        self.trusted_scheme = Scheme::Http;
        self
    }

    pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.retries = retries;
        self.backoff = backoff;
        self
    }

    fn is_trusted(&self, uri: &Uri) -> bool {
        uri.scheme() == self.trusted_scheme && uri.netloc() == self.trusted_host
    }

    fn fetch(
        client: &reqwest::blocking::Client,
        url: &str,
        retries: u32,
        backoff: Duration,
    ) -> SourceResult<Vec<u8>> {
        let mut attempt = 0;
        loop {
            let response = client
                .get(url)
                .send()
                .map_err(|e| SourceError::read(url, e))?;
            let status = response.status().as_u16();

            if status == 200 {
                // A Refresh header means the host is still preparing the
                // content; wait and re-request.
                if let Some(refresh) = response
                    .headers()
                    .get("Refresh")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                {
                    tracing::debug!(%url, refresh, "content not ready, honoring Refresh");
                    std::thread::sleep(Duration::from_secs(refresh));
                    continue;
                }
                return response
                    .bytes()
                    .map(|b| b.to_vec())
                    .map_err(|e| SourceError::read(url, e));
            }

            if RETRYABLE.contains(&status) && attempt < retries {
                let wait = backoff * 2u32.pow(attempt);
                tracing::warn!(%url, status, attempt, "retrying after transient failure");
                std::thread::sleep(wait);
                attempt += 1;
                continue;
            }
            return Err(SourceError::read(url, format!("HTTP {status}")));
        }
    }
}

impl Source for RemoteSource {
    fn can_resolve(&self, uri: &Uri) -> bool {
        self.is_trusted(uri)
    }

    fn load(&self, uri: &Uri) -> SourceResult<LazyReader> {
        if !self.is_trusted(uri) {
            return Err(SourceError::cannot_resolve(uri.to_string()));
        }
        let client = self.client.clone();
        let url = uri.to_string();
        let retries = self.retries;
        let backoff = self.backoff;
        Ok(LazyReader::deferred(move || {
            Self::fetch(&client, &url, retries, backoff)
        }))
    }
}
