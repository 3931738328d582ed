//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`batch`] - Batch submission
//! - [`archives`] - One-shot archive download
//! - [`system`] - Health and OpenAPI

use crate::types::FetchOutcome;
use serde::{Deserialize, Serialize};

mod archives;
mod batch;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use archives::*;
pub use batch::*;
pub use system::*;

// ============================================================================
// Response Types (shared across handlers)
// ============================================================================

/// Response body for a batch whose URLs all downloaded
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    /// Human-readable confirmation
    pub message: String,
    /// Relative URL the archive can be downloaded from, exactly once
    pub zip_url: String,
    /// One entry per requested URL, in request order
    pub download_logs: Vec<FetchOutcome>,
}

/// Response body for a batch where at least one URL failed
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailureResponse {
    /// Human-readable error message
    pub error: String,
    /// Machine-readable error code (always "batch_failed")
    pub code: String,
    /// One entry per requested URL, in request order
    pub download_logs: Vec<FetchOutcome>,
    /// URLs that failed, in request order
    pub failed_urls: Vec<String>,
}

/// Path under which an archive is served
pub(crate) fn archive_url(id: &str) -> String {
    format!("/api/download-zip/{id}")
}
