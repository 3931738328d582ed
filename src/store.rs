//! Temporary storage for finished archives
//!
//! Archives live in one directory shared by all requests. Each is retrievable
//! exactly once: retrieval claims the file with an atomic rename, reads it and
//! deletes it. Archives nobody retrieves are removed by the sweeper.

use crate::config::SweeperConfig;
use crate::error::{Error, Result};
use crate::types::{ArtifactHandle, ArtifactId, RetrievedArtifact};
use chrono::Local;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Prefix of every generated archive name
const ARTIFACT_PREFIX: &str = "downloaded_";

/// Extension of every generated archive name
const ARTIFACT_EXTENSION: &str = ".zip";

/// Suffix of archives still being written
const STAGING_SUFFIX: &str = ".part";

/// Marker inserted into the name of an archive being retrieved
const CLAIMED_MARKER: &str = ".claimed-";

/// Directory of archives awaiting retrieval
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `dir` (created lazily, see [`ensure_dir`](Self::ensure_dir))
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the store directory if it does not exist yet
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create artifact directory '{}': {}",
                    self.dir.display(),
                    e
                ),
            ))
        })
    }

    /// Generate a fresh artifact id
    ///
    /// Format: `downloaded_YYYYMMDD_HHMMSS_<8 hex>.zip`. The random token keeps
    /// batches finishing in the same second apart.
    pub fn allocate_id(&self) -> ArtifactId {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let token: u32 = rand::thread_rng().r#gen();
        ArtifactId::generated(format!(
            "{ARTIFACT_PREFIX}{timestamp}_{token:08x}{ARTIFACT_EXTENSION}"
        ))
    }

    /// Final location of an artifact
    pub fn path_for(&self, id: &ArtifactId) -> PathBuf {
        self.dir.join(id.as_str())
    }

    /// Location an artifact is written to before it is published
    pub fn staging_path_for(&self, id: &ArtifactId) -> PathBuf {
        self.dir.join(format!("{}{STAGING_SUFFIX}", id.as_str()))
    }

    /// Read an artifact and delete it
    ///
    /// The id is validated before the filesystem is touched. A missing
    /// artifact, or one already claimed by a concurrent retrieval, is
    /// [`Error::NotFound`]. Failure to delete after a successful read is
    /// logged and otherwise ignored.
    pub async fn retrieve(&self, id: &str) -> Result<RetrievedArtifact> {
        let id = ArtifactId::parse(id)?;
        let path = self.path_for(&id);

        let token: u32 = rand::thread_rng().r#gen();
        let claimed = self
            .dir
            .join(format!("{}{CLAIMED_MARKER}{token:08x}", id.as_str()));

        match tokio::fs::rename(&path, &claimed).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(artifact = %id, "artifact not found");
                return Err(Error::NotFound(format!("artifact {id}")));
            }
            Err(e) => return Err(Error::Io(e)),
        }

        let content = match tokio::fs::read(&claimed).await {
            Ok(content) => content,
            Err(e) => {
                remove_best_effort(&claimed).await;
                return Err(Error::Io(e));
            }
        };

        remove_best_effort(&claimed).await;
        info!(artifact = %id, bytes = content.len(), "artifact retrieved and removed");

        Ok(RetrievedArtifact { id, content })
    }

    /// Remove artifacts older than `max_age`
    ///
    /// Considers finished archives and leftovers (staging or claimed files)
    /// whose name starts with the artifact prefix; other files are left
    /// alone. Returns the number of files removed.
    pub async fn sweep(&self, max_age: Duration) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::Io(e)),
        };

        let now = SystemTime::now();
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(ARTIFACT_PREFIX) {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    warn!(path = ?entry.path(), error = %e, "failed to stat artifact");
                    continue;
                }
            };

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();

            if age >= max_age {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => {
                        debug!(path = ?entry.path(), age_secs = age.as_secs(), "swept stale artifact");
                        removed += 1;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(path = ?entry.path(), error = %e, "failed to remove stale artifact");
                    }
                }
            }
        }

        Ok(removed)
    }

    /// Spawn the background sweeper
    ///
    /// Sweeps every `config.interval` until `cancel_token` is cancelled.
    pub fn spawn_sweeper(
        &self,
        config: SweeperConfig,
        cancel_token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            info!(
                dir = ?store.dir,
                interval_secs = config.interval.as_secs(),
                max_age_secs = config.max_age.as_secs(),
                "artifact sweeper started"
            );
            let mut interval = tokio::time::interval(config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match store.sweep(config.max_age).await {
                            Ok(0) => {}
                            Ok(removed) => info!(removed, "removed stale artifacts"),
                            Err(e) => warn!(error = %e, "artifact sweep failed"),
                        }
                    }
                    _ = cancel_token.cancelled() => {
                        info!("artifact sweeper stopped");
                        break;
                    }
                }
            }
        })
    }

    /// Publish a finished archive under its final name
    pub(crate) async fn publish(&self, id: ArtifactId, staging: &Path) -> Result<ArtifactHandle> {
        let path = self.path_for(&id);
        tokio::fs::rename(staging, &path).await?;
        let size_bytes = tokio::fs::metadata(&path).await?.len();
        Ok(ArtifactHandle {
            id,
            path,
            size_bytes,
        })
    }
}

async fn remove_best_effort(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = ?path, error = %e, "failed to delete temporary file");
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn store_with_artifact(content: &[u8]) -> (ArtifactStore, ArtifactId, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let store = ArtifactStore::new(temp_dir.path().join("artifacts"));
        store.ensure_dir().await.unwrap();

        let id = store.allocate_id();
        let staging = store.staging_path_for(&id);
        tokio::fs::write(&staging, content).await.unwrap();
        store.publish(id.clone(), &staging).await.unwrap();

        (store, id, temp_dir)
    }

    #[tokio::test]
    async fn ensure_dir_creates_missing_directories() {
        let temp_dir = tempdir().unwrap();
        let store = ArtifactStore::new(temp_dir.path().join("a").join("b"));
        store.ensure_dir().await.unwrap();
        assert!(store.dir().is_dir());
        // Idempotent
        store.ensure_dir().await.unwrap();
    }

    #[test]
    fn allocated_ids_follow_the_naming_scheme_and_differ() {
        let store = ArtifactStore::new("/unused");
        let a = store.allocate_id();
        let b = store.allocate_id();

        for id in [&a, &b] {
            let name = id.as_str();
            assert!(name.starts_with("downloaded_"), "{name}");
            assert!(name.ends_with(".zip"), "{name}");
            // downloaded_ + 8 date + _ + 6 time + _ + 8 token + .zip
            assert_eq!(name.len(), "downloaded_".len() + 8 + 1 + 6 + 1 + 8 + 4, "{name}");
        }
        assert_ne!(a, b, "same-second ids must not collide");
    }

    #[tokio::test]
    async fn retrieval_is_single_use() {
        let (store, id, _temp_dir) = store_with_artifact(b"PK\x03\x04zip").await;

        let first = store.retrieve(id.as_str()).await.unwrap();
        assert_eq!(first.content, b"PK\x03\x04zip");
        assert_eq!(first.id, id);
        assert!(!store.path_for(&id).exists());

        let second = store.retrieve(id.as_str()).await;
        assert!(matches!(second, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn retrieval_leaves_no_files_behind() {
        let (store, id, _temp_dir) = store_with_artifact(b"data").await;
        store.retrieve(id.as_str()).await.unwrap();

        let mut entries = tokio::fs::read_dir(store.dir()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_retrievals_succeed_exactly_once() {
        let (store, id, _temp_dir) = store_with_artifact(b"data").await;

        let (a, b) = tokio::join!(store.retrieve(id.as_str()), store.retrieve(id.as_str()));
        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn missing_artifact_is_not_found() {
        let temp_dir = tempdir().unwrap();
        let store = ArtifactStore::new(temp_dir.path());

        let result = store.retrieve("downloaded_20240101_000000_00000000.zip").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn traversal_ids_are_rejected_before_touching_the_filesystem() {
        let temp_dir = tempdir().unwrap();
        // Plant a file one level up that a traversal would reach
        let secret = temp_dir.path().join("secret.zip");
        tokio::fs::write(&secret, b"secret").await.unwrap();
        let store = ArtifactStore::new(temp_dir.path().join("artifacts"));
        store.ensure_dir().await.unwrap();

        for id in ["../secret.zip", "../../etc/passwd", "/etc/passwd"] {
            let result = store.retrieve(id).await;
            assert!(
                matches!(result, Err(Error::InvalidArtifactId(_))),
                "{id} should be rejected"
            );
        }
        assert!(secret.exists(), "traversal must not consume files outside the store");
    }

    #[tokio::test]
    async fn sweep_removes_only_old_artifacts() {
        let (store, id, _temp_dir) = store_with_artifact(b"old").await;
        let unrelated = store.dir().join("keep-me.txt");
        tokio::fs::write(&unrelated, b"x").await.unwrap();

        // Nothing is older than an hour yet
        assert_eq!(store.sweep(Duration::from_secs(3600)).await.unwrap(), 0);
        assert!(store.path_for(&id).exists());

        // Everything is at least zero seconds old
        assert_eq!(store.sweep(Duration::ZERO).await.unwrap(), 1);
        assert!(!store.path_for(&id).exists());
        assert!(unrelated.exists());
    }

    #[tokio::test]
    async fn sweep_of_missing_directory_is_a_no_op() {
        let temp_dir = tempdir().unwrap();
        let store = ArtifactStore::new(temp_dir.path().join("never-created"));
        assert_eq!(store.sweep(Duration::ZERO).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sweeper_runs_until_cancelled() {
        let (store, id, _temp_dir) = store_with_artifact(b"stale").await;
        let cancel_token = CancellationToken::new();
        let config = SweeperConfig {
            enabled: true,
            interval: Duration::from_millis(20),
            max_age: Duration::ZERO,
        };

        let handle = store.spawn_sweeper(config, cancel_token.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!store.path_for(&id).exists(), "sweeper should remove the stale artifact");

        cancel_token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop after cancellation")
            .unwrap();
    }
}
