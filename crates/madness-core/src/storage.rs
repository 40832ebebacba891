//! Persistence seam.
//!
//! The engine hands snapshots and finished rounds to a [`Storage`] through
//! the dispatch queue. Implementations live outside the core; the JSON
//! file store is the production one and [`MemoryStorage`] serves tests and
//! dry runs.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{self, BoxFuture, FutureExt};

use crate::snapshot::{RoundArchive, Snapshot};

/// Errors from persistence backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A filesystem operation failed.
    #[error("storage I/O failed on {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A document could not be serialized or parsed.
    #[error("storage document {path} is malformed: {source}")]
    Serialization {
        /// The document involved.
        path: String,
        /// The underlying serde error.
        source: serde_json::Error,
    },

    /// The backend is not usable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A durable home for engine state.
pub trait Storage: Send + Sync {
    /// Replace the persisted state with `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails.
    fn save(&self, snapshot: Arc<Snapshot>) -> BoxFuture<'static, Result<(), StorageError>>;

    /// Keep a finished round under its snapshot reference.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails.
    fn archive(&self, archive: Arc<RoundArchive>) -> BoxFuture<'static, Result<(), StorageError>>;

    /// Load the last saved state, `None` if nothing was ever saved.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if stored documents exist but cannot be
    /// read.
    fn load(&self) -> BoxFuture<'static, Result<Option<Snapshot>, StorageError>>;
}

impl<T: Storage + ?Sized> Storage for Arc<T> {
    fn save(&self, snapshot: Arc<Snapshot>) -> BoxFuture<'static, Result<(), StorageError>> {
        (**self).save(snapshot)
    }

    fn archive(&self, archive: Arc<RoundArchive>) -> BoxFuture<'static, Result<(), StorageError>> {
        (**self).archive(archive)
    }

    fn load(&self) -> BoxFuture<'static, Result<Option<Snapshot>, StorageError>> {
        (**self).load()
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    latest: Option<Snapshot>,
    saves: usize,
    archives: Vec<RoundArchive>,
}

/// In-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<MemoryInner>,
    fail: bool,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage whose writes always fail.
    pub fn failing() -> Self {
        Self {
            inner: Mutex::new(MemoryInner::default()),
            fail: true,
        }
    }

    /// Seed storage with a previously saved snapshot.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                latest: Some(snapshot),
                ..MemoryInner::default()
            }),
            fail: false,
        }
    }

    /// The newest saved snapshot.
    pub fn latest(&self) -> Option<Snapshot> {
        self.lock().latest.clone()
    }

    /// How many snapshots were written.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    /// Every archived round, oldest first.
    pub fn archives(&self) -> Vec<RoundArchive> {
        self.lock().archives.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refuse<T: Send + 'static>(&self) -> Option<BoxFuture<'static, Result<T, StorageError>>> {
        self.fail.then(|| {
            future::ready(Err(StorageError::Unavailable(
                "memory storage configured to fail".to_owned(),
            )))
            .boxed()
        })
    }
}

impl Storage for MemoryStorage {
    fn save(&self, snapshot: Arc<Snapshot>) -> BoxFuture<'static, Result<(), StorageError>> {
        if let Some(refused) = self.refuse() {
            return refused;
        }
        let mut inner = self.lock();
        inner.latest = Some(Snapshot::clone(&snapshot));
        inner.saves = inner.saves.saturating_add(1);
        future::ready(Ok(())).boxed()
    }

    fn archive(&self, archive: Arc<RoundArchive>) -> BoxFuture<'static, Result<(), StorageError>> {
        if let Some(refused) = self.refuse() {
            return refused;
        }
        self.lock().archives.push(RoundArchive::clone(&archive));
        future::ready(Ok(())).boxed()
    }

    fn load(&self) -> BoxFuture<'static, Result<Option<Snapshot>, StorageError>> {
        future::ready(Ok(self.latest())).boxed()
    }
}
