//! [`JsonFileStore`]: the snapshot contract on a local directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use madness_core::snapshot::{RoundArchive, Snapshot};
use madness_core::storage::{Storage, StorageError};

/// Roster document.
pub const REGISTERED_FILE: &str = "registered.json";
/// Raglist document.
pub const RAGLIST_FILE: &str = "raglist.json";
/// Bounty ledger document.
pub const BOUNTIES_FILE: &str = "bounties.json";
/// Rounds, mode flag and history document.
pub const STATE_FILE: &str = "state.json";
/// Subdirectory holding finished rounds.
pub const ARCHIVE_DIR: &str = "events";

/// Stores engine state as pretty-printed JSON files in one directory.
///
/// Every document is written to a `.tmp` sibling first and renamed into
/// place, so a crash mid-write leaves the previous version intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: Arc<PathBuf>,
}

impl JsonFileStore {
    /// Create a store rooted at `data_dir`. Nothing is touched on disk
    /// until the first write.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(data_dir.into()),
        }
    }

    /// The data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an archived round.
    pub fn archive_path(&self, snapshot_ref: &str) -> PathBuf {
        self.root
            .join(ARCHIVE_DIR)
            .join(format!("{snapshot_ref}.json"))
    }

    /// Read back an archived round.
    pub async fn read_archive(&self, snapshot_ref: &str) -> Result<Option<RoundArchive>, StorageError> {
        read_document(&self.archive_path(snapshot_ref)).await
    }

    async fn write_snapshot(root: &Path, snapshot: &Snapshot) -> Result<(), StorageError> {
        create_dir(root).await?;
        write_document(&root.join(REGISTERED_FILE), &snapshot.registered).await?;
        write_document(&root.join(RAGLIST_FILE), &snapshot.raglist).await?;
        write_document(&root.join(BOUNTIES_FILE), &snapshot.bounties).await?;
        write_document(&root.join(STATE_FILE), &snapshot.state).await?;
        debug!(root = %root.display(), "snapshot written");
        Ok(())
    }

    async fn read_snapshot(root: &Path) -> Result<Option<Snapshot>, StorageError> {
        let registered = read_document(&root.join(REGISTERED_FILE)).await?;
        let raglist = read_document(&root.join(RAGLIST_FILE)).await?;
        let bounties = read_document(&root.join(BOUNTIES_FILE)).await?;
        let state = read_document(&root.join(STATE_FILE)).await?;

        if registered.is_none() && raglist.is_none() && bounties.is_none() && state.is_none() {
            info!(root = %root.display(), "no saved state found");
            return Ok(None);
        }

        Ok(Some(Snapshot {
            registered: registered.unwrap_or_default(),
            raglist: raglist.unwrap_or_default(),
            bounties: bounties.unwrap_or_default(),
            state: state.unwrap_or_default(),
        }))
    }
}

impl Storage for JsonFileStore {
    fn save(&self, snapshot: Arc<Snapshot>) -> BoxFuture<'static, Result<(), StorageError>> {
        let root = Arc::clone(&self.root);
        async move { Self::write_snapshot(&root, &snapshot).await }.boxed()
    }

    fn archive(&self, archive: Arc<RoundArchive>) -> BoxFuture<'static, Result<(), StorageError>> {
        let dir = self.root.join(ARCHIVE_DIR);
        let path = self.archive_path(&archive.snapshot_ref);
        async move {
            create_dir(&dir).await?;
            write_document(&path, archive.as_ref()).await?;
            info!(path = %path.display(), "round archived");
            Ok(())
        }
        .boxed()
    }

    fn load(&self) -> BoxFuture<'static, Result<Option<Snapshot>, StorageError>> {
        let root = Arc::clone(&self.root);
        async move { Self::read_snapshot(&root).await }.boxed()
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

async fn create_dir(dir: &Path) -> Result<(), StorageError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| io_error(dir, e))
}

/// Serialize with two-space indentation and a trailing newline, write to
/// `<path>.tmp`, then rename over `path`.
async fn write_document<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let mut body = serde_json::to_string_pretty(value).map_err(|source| {
        StorageError::Serialization {
            path: path.display().to_string(),
            source,
        }
    })?;
    body.push('\n');

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, body)
        .await
        .map_err(|e| io_error(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_error(path, e))
}

/// Read and parse a document, `None` if the file does not exist.
async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let body = match tokio::fs::read_to_string(path).await {
        Ok(body) => body,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, e)),
    };
    serde_json::from_str(&body)
        .map(Some)
        .map_err(|source| StorageError::Serialization {
            path: path.display().to_string(),
            source,
        })
}
