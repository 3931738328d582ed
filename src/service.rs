//! The batch-zip service: one value wiring fetcher, archive builder and store together

use crate::archive::ArchiveBuilder;
use crate::batch::{BatchResult, run_batch};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::store::ArtifactStore;
use crate::types::{BatchOutcome, DownloadRequest, RetrievedArtifact};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Batch downloader service (cloneable, all state is shared)
#[derive(Clone)]
pub struct BatchZipService {
    /// Configuration (shared with the API server)
    pub(crate) config: Arc<Config>,
    /// HTTP fetcher shared by every batch
    pub(crate) fetcher: Fetcher,
    /// Archive builder
    pub(crate) builder: ArchiveBuilder,
    /// Temporary artifact storage
    pub(crate) store: ArtifactStore,
    /// Cancelled on shutdown; stops the sweeper and the API server
    pub(crate) cancel_token: CancellationToken,
    /// Set to false during shutdown; new batches are rejected
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl BatchZipService {
    /// Create a service from `config`
    ///
    /// Validates the configuration, builds the HTTP client and creates the
    /// artifact directory if it does not exist.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let fetcher = Fetcher::new(&config.fetch, config.retry.clone())?;
        let builder = ArchiveBuilder::new(config.storage.compression_level);
        let store = ArtifactStore::new(config.temp_dir().clone());
        store.ensure_dir().await?;

        tracing::info!(
            temp_dir = ?store.dir(),
            max_retries = config.retry.max_retries,
            max_concurrent_fetches = ?config.batch.max_concurrent_fetches,
            "batch-zip service initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            builder,
            store,
            cancel_token: CancellationToken::new(),
            accepting_new: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Artifact store backing this service
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run a batch to completion
    ///
    /// Returns [`BatchOutcome::Archived`] when every URL was downloaded and
    /// the archive is stored, [`BatchOutcome::Failed`] when at least one URL
    /// failed (no archive is built). Errors are reserved for invalid
    /// requests, archive construction failures and shutdown.
    pub async fn submit(&self, request: DownloadRequest) -> Result<BatchOutcome> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let request = request.validate()?;
        let authorization = request
            .credentials()
            .map(|credentials| credentials.authorization_header());

        let BatchResult { log, entries } = run_batch(
            &self.fetcher,
            &request.urls,
            authorization.as_deref(),
            self.config.batch.max_concurrent_fetches,
        )
        .await;

        if !log.is_success() {
            return Ok(BatchOutcome::Failed { log });
        }

        let artifact = self.builder.build(&self.store, entries).await?;
        Ok(BatchOutcome::Archived { artifact, log })
    }

    /// Retrieve an archive and remove it from storage
    pub async fn retrieve(&self, id: &str) -> Result<RetrievedArtifact> {
        self.store.retrieve(id).await
    }

    /// Spawn the background sweeper, if enabled
    ///
    /// The task stops when [`shutdown`](Self::shutdown) is called.
    pub fn spawn_sweeper(&self) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.sweeper.enabled {
            tracing::debug!("artifact sweeper disabled");
            return None;
        }
        Some(
            self.store
                .spawn_sweeper(self.config.sweeper.clone(), self.cancel_token.child_token()),
        )
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server stops accepting connections when
    /// [`shutdown`](Self::shutdown) is called.
    pub fn spawn_api_server(&self) -> tokio::task::JoinHandle<Result<()>> {
        let service = Arc::new(self.clone());
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(service, config).await })
    }

    /// Token cancelled on shutdown
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Stop accepting batches and stop background tasks
    ///
    /// Batches already running finish normally. Archives waiting for
    /// retrieval stay on disk until the next sweep of a later run.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new batches");

        self.cancel_token.cancel();
        tracing::info!("Shutdown complete");
        Ok(())
    }
}

impl std::fmt::Debug for BatchZipService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchZipService")
            .field("temp_dir", &self.store.dir())
            .field("accepting_new", &self.accepting_new.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
