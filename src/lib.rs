//! # batch-zip
//!
//! Fetch a batch of URLs concurrently and hand them back as one ZIP archive.
//!
//! ## How a batch runs
//!
//! - Every URL is fetched concurrently, each with up to three retries
//! - Each payload is stored in the archive under a path mirroring its URL
//!   (`example.com/img.png`, `example.com/index.html` for directory-like URLs)
//! - The archive is built only when every URL succeeded; otherwise the caller
//!   gets the per-URL log and nothing is stored
//! - The archive can be retrieved exactly once, after which it is deleted
//!
//! ## Quick Start
//!
//! ```no_run
//! use batch_zip::{BatchOutcome, BatchZipService, Config, DownloadRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = BatchZipService::new(Config::default()).await?;
//!
//!     let request = DownloadRequest::new([
//!         "https://example.com/",
//!         "https://example.com/img.png",
//!     ]);
//!
//!     match service.submit(request).await? {
//!         BatchOutcome::Archived { artifact, .. } => {
//!             let archive = service.retrieve(artifact.id.as_str()).await?;
//!             std::fs::write("bundle.zip", archive.content)?;
//!         }
//!         BatchOutcome::Failed { log } => {
//!             for url in log.failed_urls() {
//!                 eprintln!("failed: {url}");
//!             }
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// ZIP archive construction
pub mod archive;
/// Concurrent batch fetching
pub mod batch;
/// Configuration types
pub mod config;
/// URL to archive path mapping
pub mod entry_path;
/// Error types
pub mod error;
/// Single-URL download with retry
pub mod fetcher;
/// Retry logic with backoff
pub mod retry;
/// Service facade and lifecycle
pub mod service;
/// Temporary artifact storage
pub mod store;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{ApiError, ArchiveError, Error, FetchError, Result, ToHttpStatus};
pub use service::BatchZipService;
pub use types::{
    ArtifactHandle, ArtifactId, BatchOutcome, DownloadLog, DownloadRequest, FetchOutcome,
    FetchStatus, RetrievedArtifact,
};

/// Run the service until a termination signal arrives, then shut it down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use batch_zip::{BatchZipService, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = BatchZipService::new(Config::default()).await?;
///     service.spawn_sweeper();
///     service.spawn_api_server();
///
///     run_with_shutdown(service).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(service: BatchZipService) -> Result<()> {
    wait_for_signal().await;
    service.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            wait_for_one(SignalKind::interrupt(), "SIGINT").await;
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            wait_for_one(SignalKind::terminate(), "SIGTERM").await;
        }
    }
}

#[cfg(unix)]
async fn wait_for_one(kind: tokio::signal::unix::SignalKind, name: &str) {
    match tokio::signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
            tracing::info!(signal = name, "Received signal");
        }
        Err(_) => {
            tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
