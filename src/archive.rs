//! ZIP archive construction
//!
//! Archives are written to a staging file inside the store directory and only
//! renamed to their final name once complete, so a retrievable artifact is
//! always a whole archive. Writing runs on the blocking thread pool.

use crate::error::{ArchiveError, Error, Result};
use crate::store::ArtifactStore;
use crate::types::{ArchiveEntry, ArtifactHandle, ArtifactId};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

/// Builds one ZIP archive per successful batch
#[derive(Clone, Debug)]
pub struct ArchiveBuilder {
    compression_level: u32,
}

impl ArchiveBuilder {
    /// Create a builder using deflate at `compression_level` (0-9)
    pub fn new(compression_level: u32) -> Self {
        Self {
            compression_level: compression_level.min(9),
        }
    }

    /// Deflate level in use
    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    /// Write `entries` into a new archive in `store`
    ///
    /// Entries keep their order. When two entries share a path only the first
    /// is stored. On any failure the partial file is removed and no artifact
    /// becomes visible.
    pub async fn build(
        &self,
        store: &ArtifactStore,
        entries: Vec<ArchiveEntry>,
    ) -> Result<ArtifactHandle> {
        store.ensure_dir().await?;
        self.build_with_id(store, store.allocate_id(), entries).await
    }

    async fn build_with_id(
        &self,
        store: &ArtifactStore,
        id: ArtifactId,
        entries: Vec<ArchiveEntry>,
    ) -> Result<ArtifactHandle> {
        let staging = store.staging_path_for(&id);
        let level = self.compression_level;

        debug!(artifact = %id, entries = entries.len(), level, "building archive");

        let target = staging.clone();
        let written = tokio::task::spawn_blocking(move || write_to_file(&target, &entries, level))
            .await
            .map_err(|e| Error::Other(format!("archive task failed: {e}")))
            .and_then(|result| result);

        let stored = match written {
            Ok(stored) => stored,
            Err(e) => {
                discard_staging(&staging).await;
                return Err(e);
            }
        };

        let handle = match store.publish(id, &staging).await {
            Ok(handle) => handle,
            Err(e) => {
                discard_staging(&staging).await;
                return Err(Error::Archive(ArchiveError::FinalizeFailed {
                    path: staging,
                    reason: e.to_string(),
                }));
            }
        };

        info!(
            artifact = %handle.id,
            entries = stored,
            size_bytes = handle.size_bytes,
            "archive ready"
        );
        Ok(handle)
    }
}

/// Create `path` and write the archive into it, returning the number of entries stored
fn write_to_file(path: &Path, entries: &[ArchiveEntry], level: u32) -> Result<usize> {
    let file = File::create(path).map_err(|e| ArchiveError::WriteFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let (writer, stored) = write_archive(BufWriter::new(file), entries, level, path)?;

    let file = writer.into_inner().map_err(|e| ArchiveError::FinalizeFailed {
        path: path.to_path_buf(),
        reason: e.error().to_string(),
    })?;
    file.sync_all().map_err(|e| ArchiveError::FinalizeFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(stored)
}

/// Write a complete archive into `writer`
///
/// `target` only names the destination in error messages.
fn write_archive<W: Write + Seek>(
    writer: W,
    entries: &[ArchiveEntry],
    level: u32,
    target: &Path,
) -> Result<(W, usize)> {
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level as i32));

    let mut zip = ZipWriter::new(writer);
    let mut seen = HashSet::new();

    for entry in entries {
        if !seen.insert(entry.entry_path.as_str()) {
            warn!(entry_path = %entry.entry_path, "duplicate entry path, keeping the first");
            continue;
        }

        let append_failed = |reason: String| ArchiveError::AppendFailed {
            entry_path: entry.entry_path.clone(),
            reason,
        };
        zip.start_file(entry.entry_path.as_str(), options)
            .map_err(|e| append_failed(e.to_string()))?;
        zip.write_all(&entry.content)
            .map_err(|e| append_failed(e.to_string()))?;
    }

    let writer = zip.finish().map_err(|e| ArchiveError::FinalizeFailed {
        path: target.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok((writer, seen.len()))
}

async fn discard_staging(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = ?path, error = %e, "failed to remove partial archive"),
    }
}
