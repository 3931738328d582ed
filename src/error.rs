//! Error types for batch-zip
//!
//! This module provides the error handling for the whole pipeline:
//! - The crate-wide [`Error`] type and [`Result`] alias
//! - [`FetchError`] for individual fetch attempts (classified by the retry engine)
//! - [`ArchiveError`] for ZIP construction failures
//! - HTTP status mapping ([`ToHttpStatus`]) and the JSON error body ([`ApiError`])

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for batch-zip operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for batch-zip
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "temp_dir")
        key: Option<String>,
    },

    /// Request rejected before any work was done (empty URL list, blank entry, bad body)
    #[error("invalid request: {0}")]
    Validation(String),

    /// A URL could not be turned into an archive entry path
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Artifact id rejected (path traversal, absolute path, separators)
    #[error("invalid artifact id: {0}")]
    InvalidArtifactId(String),

    /// Artifact not found in temporary storage
    #[error("{0} not found")]
    NotFound(String),

    /// At least one URL of the batch failed after all retries
    #[error("{failed} of {total} URLs failed to download")]
    BatchFailed {
        /// Number of URLs that failed permanently
        failed: usize,
        /// Number of URLs in the batch
        total: usize,
    },

    /// Archive construction failed
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error outside of a batch fetch (e.g. client construction)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Shutdown in progress - not accepting new batches
    #[error("shutdown in progress: not accepting new batches")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Failure of a single fetch attempt
///
/// These never escape a batch: the fetcher turns the last one into the
/// `error` field of a failed outcome.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The URL cannot be requested at all
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The server answered with a non-2xx status
    #[error("status: {code} {reason}")]
    Status {
        /// HTTP status code
        code: u16,
        /// Canonical reason phrase (may be empty)
        reason: String,
    },

    /// Connection, TLS, DNS or timeout failure
    #[error("{0}")]
    Transport(String),

    /// The response started but the body could not be read completely
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Archive construction errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Adding an entry to the archive failed
    #[error("failed to append {entry_path}: {reason}")]
    AppendFailed {
        /// The entry that could not be written
        entry_path: String,
        /// The reason the append failed
        reason: String,
    },

    /// The backing file could not be created or written
    #[error("failed to write {path}: {reason}")]
    WriteFailed {
        /// The backing file path
        path: PathBuf,
        /// The reason the write failed
        reason: String,
    },

    /// Finishing, syncing or publishing the archive failed
    #[error("failed to finalize {path}: {reason}")]
    FinalizeFailed {
        /// The backing file path
        path: PathBuf,
        /// The reason finalization failed
        reason: String,
    },
}

/// API error response format
///
/// `error` is the human-readable message so that simple clients can display it
/// directly; `code` is machine-readable.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": "invalid request: no URLs were provided",
///   "code": "validation_error"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Human-readable error message
    pub error: String,

    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            details: None,
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - rejected before any side effect
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,
            Error::InvalidUrl(_) => 400,
            Error::InvalidArtifactId(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 502 Bad Gateway - upstream URLs failed
            Error::BatchFailed { .. } => 502,
            Error::Network(_) => 502,

            // 500 Internal Server Error
            Error::Archive(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(_) => "validation_error",
            Error::InvalidUrl(_) => "invalid_url",
            Error::InvalidArtifactId(_) => "invalid_artifact_id",
            Error::NotFound(_) => "not_found",
            Error::BatchFailed { .. } => "batch_failed",
            Error::Archive(e) => match e {
                ArchiveError::AppendFailed { .. } => "archive_append_failed",
                ArchiveError::WriteFailed { .. } => "archive_write_failed",
                ArchiveError::FinalizeFailed { .. } => "archive_finalize_failed",
            },
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::BatchFailed { failed, total } => Some(serde_json::json!({
                "failed": failed,
                "total": total,
            })),
            Error::Archive(ArchiveError::AppendFailed { entry_path, .. }) => {
                Some(serde_json::json!({
                    "entry_path": entry_path,
                }))
            }
            _ => None,
        };

        ApiError {
            error: message,
            code,
            details,
        }
    }
}
