//! Concurrent fetching of a whole batch
//!
//! All URLs are fetched concurrently on the calling task and the batch waits
//! for every one of them to settle; a failure never cancels the others. The
//! resulting log is in request order regardless of completion order.

use crate::fetcher::Fetcher;
use crate::types::{ArchiveEntry, DownloadLog, FetchOutcome};
use futures::StreamExt;
use futures::future::join_all;
use futures::stream;
use tracing::{info, warn};

/// Everything a finished batch produced
#[derive(Debug)]
pub struct BatchResult {
    /// One outcome per requested URL, in request order (payloads removed)
    pub log: DownloadLog,
    /// Downloaded payloads of the successful URLs, in request order
    pub entries: Vec<ArchiveEntry>,
}

impl BatchResult {
    /// True when every URL succeeded, i.e. an archive may be built
    pub fn is_success(&self) -> bool {
        self.log.is_success()
    }
}

/// Fetch every URL and collect the outcomes
///
/// `max_in_flight` bounds the number of concurrent fetches; `None` starts all
/// of them at once.
pub async fn run_batch(
    fetcher: &Fetcher,
    urls: &[String],
    authorization: Option<&str>,
    max_in_flight: Option<usize>,
) -> BatchResult {
    info!(
        urls = urls.len(),
        max_in_flight = ?max_in_flight,
        authenticated = authorization.is_some(),
        "starting batch"
    );

    // Futures must own their URL: borrowing the closure argument makes the
    // batch future non-Send
    let fetches: Vec<_> = urls
        .iter()
        .cloned()
        .map(|url| async move { fetcher.fetch_with_retry(&url, authorization).await })
        .collect();

    let outcomes: Vec<FetchOutcome> = match max_in_flight {
        Some(limit) => stream::iter(fetches).buffered(limit.max(1)).collect().await,
        None => join_all(fetches).await,
    };

    let mut log = DownloadLog::new(outcomes);
    let entries = log.take_entries();

    let failed = log.failed_count();
    if failed > 0 {
        warn!(
            failed,
            total = log.len(),
            failed_urls = ?log.failed_urls(),
            "batch finished with failures"
        );
    } else {
        info!(total = log.len(), "batch finished, all URLs downloaded");
    }

    BatchResult { log, entries }
}
