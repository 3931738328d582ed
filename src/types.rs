//! Core types for batch-zip

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// A batch submission: the URLs to bundle plus optional basic-auth credentials
///
/// Deserialized leniently (`urls` may be missing) so that a missing list is
/// reported as a validation error rather than a JSON rejection.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct DownloadRequest {
    /// URLs to fetch, in order. Duplicates are allowed.
    #[serde(default)]
    pub urls: Vec<String>,

    /// Basic-auth username, shared by every URL in the batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Basic-auth password, shared by every URL in the batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl DownloadRequest {
    /// Create a request without credentials
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            username: None,
            password: None,
        }
    }

    /// Attach basic-auth credentials
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Trim every URL and reject empty lists or blank entries
    pub fn validate(mut self) -> Result<Self> {
        if self.urls.is_empty() {
            return Err(Error::Validation("no URLs were provided".to_string()));
        }
        for (index, url) in self.urls.iter_mut().enumerate() {
            let trimmed = url.trim();
            if trimmed.is_empty() {
                return Err(Error::Validation(format!("URL #{} is blank", index + 1)));
            }
            if trimmed.len() != url.len() {
                *url = trimmed.to_string();
            }
        }
        Ok(self)
    }

    /// Credentials, when both username and password are present and non-empty
    pub fn credentials(&self) -> Option<Credentials> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(Credentials {
                    username: username.to_string(),
                    password: password.to_string(),
                })
            }
            _ => None,
        }
    }

    /// The same request restricted to URLs not listed in `skip`
    ///
    /// Used for the "skip failed and proceed" re-run.
    pub fn without_urls(&self, skip: &[String]) -> Self {
        Self {
            urls: self
                .urls
                .iter()
                .filter(|url| !skip.contains(url))
                .cloned()
                .collect(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// Basic-auth credentials for a whole batch
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username
    pub username: String,
    /// Password
    pub password: String,
}

impl Credentials {
    /// `Authorization` header value: `Basic base64(username:password)`
    pub fn authorization_header(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {encoded}")
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Terminal status of one URL
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    /// Body downloaded completely
    Success,
    /// Retries exhausted (or the URL could not be requested)
    Failed,
}

/// A downloaded payload and the path it will occupy in the archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Relative posix-style path, host first
    pub entry_path: String,
    /// Response body
    pub content: Bytes,
}

/// Outcome of fetching one URL
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FetchOutcome {
    /// The requested URL
    pub url: String,

    /// Whether the URL was downloaded
    pub status: FetchStatus,

    /// Retries consumed (attempts - 1)
    pub retries: u32,

    /// Last error message, present iff the fetch failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Downloaded payload, present iff the fetch succeeded
    #[serde(skip)]
    pub entry: Option<ArchiveEntry>,
}

impl FetchOutcome {
    /// Successful outcome
    pub fn success(url: impl Into<String>, retries: u32, entry: ArchiveEntry) -> Self {
        Self {
            url: url.into(),
            status: FetchStatus::Success,
            retries,
            error: None,
            entry: Some(entry),
        }
    }

    /// Failed outcome
    pub fn failed(url: impl Into<String>, retries: u32, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: FetchStatus::Failed,
            retries,
            error: Some(error.into()),
            entry: None,
        }
    }

    /// True when the URL was downloaded
    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }
}

/// Per-URL outcomes of one batch, in request order
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct DownloadLog(Vec<FetchOutcome>);

impl DownloadLog {
    /// Wrap outcomes that are already in request order
    pub fn new(outcomes: Vec<FetchOutcome>) -> Self {
        Self(outcomes)
    }

    /// All outcomes
    pub fn outcomes(&self) -> &[FetchOutcome] {
        &self.0
    }

    /// Consume the log, yielding its outcomes
    pub fn into_outcomes(self) -> Vec<FetchOutcome> {
        self.0
    }

    /// Number of outcomes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the log has no outcomes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of failed URLs
    pub fn failed_count(&self) -> usize {
        self.0.iter().filter(|o| !o.is_success()).count()
    }

    /// True when every URL succeeded
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// URLs that failed, in request order
    pub fn failed_urls(&self) -> Vec<String> {
        self.0
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.url.clone())
            .collect()
    }

    /// URLs that succeeded, in request order
    pub fn succeeded_urls(&self) -> Vec<String> {
        self.0
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.url.clone())
            .collect()
    }

    /// Move the downloaded payloads out of the log, in request order
    pub fn take_entries(&mut self) -> Vec<ArchiveEntry> {
        self.0.iter_mut().filter_map(|o| o.entry.take()).collect()
    }
}

/// Validated name of an archive in temporary storage
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Validate a caller-supplied id
    ///
    /// Rejects empty ids, `..`, absolute paths and path separators, so the id
    /// can only ever name a file directly inside the store directory.
    pub fn parse(id: &str) -> Result<Self> {
        if id.is_empty() {
            return Err(Error::InvalidArtifactId("empty id".to_string()));
        }
        if id.contains("..") {
            return Err(Error::InvalidArtifactId(format!(
                "'{id}' contains a parent-directory reference"
            )));
        }
        if std::path::Path::new(id).is_absolute() || id.starts_with('/') || id.starts_with('\\') {
            return Err(Error::InvalidArtifactId(format!("'{id}' is an absolute path")));
        }
        if id.contains(['/', '\\', '\0']) {
            return Err(Error::InvalidArtifactId(format!(
                "'{id}' contains a path separator"
            )));
        }
        Ok(Self(id.to_string()))
    }

    /// Wrap a name generated by the store
    pub(crate) fn generated(name: String) -> Self {
        debug_assert!(Self::parse(&name).is_ok(), "generated id {name} must be valid");
        Self(name)
    }

    /// The id as a file name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A finished archive waiting in temporary storage
#[derive(Clone, Debug)]
pub struct ArtifactHandle {
    /// Generated file name
    pub id: ArtifactId,
    /// Backing file
    pub path: PathBuf,
    /// Size of the archive on disk
    pub size_bytes: u64,
}

/// Result of submitting a batch
#[derive(Debug)]
pub enum BatchOutcome {
    /// Every URL succeeded and the archive is ready for one retrieval
    Archived {
        /// Handle to the archive
        artifact: ArtifactHandle,
        /// Per-URL log
        log: DownloadLog,
    },
    /// At least one URL failed; no archive was produced
    Failed {
        /// Per-URL log
        log: DownloadLog,
    },
}

impl BatchOutcome {
    /// Per-URL log of the batch
    pub fn log(&self) -> &DownloadLog {
        match self {
            BatchOutcome::Archived { log, .. } | BatchOutcome::Failed { log } => log,
        }
    }
}

/// An archive read back from storage (the backing file is already gone)
#[derive(Clone, Debug)]
pub struct RetrievedArtifact {
    /// The id it was stored under; doubles as the download file name
    pub id: ArtifactId,
    /// Archive bytes
    pub content: Vec<u8>,
}
