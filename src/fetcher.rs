//! Single-URL download with bounded retry
//!
//! [`Fetcher::fetch_with_retry`] never returns an error: every way a URL can
//! fail ends up in the `error` field of a failed [`FetchOutcome`], so a batch
//! can always report on every URL it was given.

use crate::config::{FetchConfig, RetryConfig};
use crate::entry_path::entry_path_for;
use crate::error::{Error, FetchError, Result};
use crate::retry::download_with_retry;
use crate::types::{ArchiveEntry, FetchOutcome};
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use tracing::{debug, info, warn};
use url::Url;

/// HTTP fetcher shared by every URL of every batch
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl Fetcher {
    /// Build a fetcher with its own HTTP client
    pub fn new(fetch: &FetchConfig, retry: RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(fetch.timeout)
            .connect_timeout(fetch.connect_timeout)
            .user_agent(fetch.user_agent.clone())
            .build()
            .map_err(Error::Network)?;
        Ok(Self::with_client(client, retry))
    }

    /// Build a fetcher around an existing client
    pub fn with_client(client: reqwest::Client, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    /// Download one URL, retrying non-2xx answers and transport failures
    ///
    /// `authorization`, when given, is sent as the `Authorization` header on
    /// every attempt. On success the whole body is buffered and paired with
    /// the URL's archive entry path.
    pub async fn fetch_with_retry(&self, url: &str, authorization: Option<&str>) -> FetchOutcome {
        let auth_header = match authorization.map(HeaderValue::from_str).transpose() {
            Ok(header) => header.map(|mut h| {
                h.set_sensitive(true);
                h
            }),
            Err(e) => {
                warn!(url = %url, error = %e, "invalid Authorization header");
                return FetchOutcome::failed(url, 0, format!("invalid Authorization header: {e}"));
            }
        };

        // A URL that cannot be requested still goes through the retry loop,
        // so every failed URL reports the same retry count
        let prepared = prepare(url);
        if let Err(e) = &prepared {
            warn!(url = %url, error = %e, "URL cannot be fetched");
        }

        let report = download_with_retry(&self.retry, || {
            let prepared = prepared.clone();
            let auth_header = auth_header.clone();
            async move {
                let (parsed, entry_path) = prepared?;
                let content = self.fetch_once(parsed, auth_header).await?;
                Ok::<_, FetchError>(ArchiveEntry {
                    entry_path,
                    content,
                })
            }
        })
        .await;

        match report.result {
            Ok(entry) => {
                info!(
                    url = %url,
                    entry_path = %entry.entry_path,
                    bytes = entry.content.len(),
                    retries = report.retries,
                    "download succeeded"
                );
                FetchOutcome::success(url, report.retries, entry)
            }
            Err(e) => {
                warn!(url = %url, retries = report.retries, error = %e, "download failed");
                FetchOutcome::failed(url, report.retries, e.to_string())
            }
        }
    }

    /// One GET attempt, body fully buffered
    async fn fetch_once(
        &self,
        url: Url,
        auth_header: Option<HeaderValue>,
    ) -> std::result::Result<Bytes, FetchError> {
        debug!(url = %url, "sending request");

        let mut request = self.client.get(url);
        if let Some(header) = auth_header {
            request = request.header(AUTHORIZATION, header);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Transport(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))
    }
}

/// Parse the URL, check it is requestable, and derive its entry path
fn prepare(url: &str) -> std::result::Result<(Url, String), FetchError> {
    let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }

    let entry_path = entry_path_for(&parsed).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    Ok((parsed, entry_path))
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}
