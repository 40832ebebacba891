//! Fire-and-forget outbound work.
//!
//! The engine pushes notifications and storage jobs onto the [`Outbox`]
//! while it still holds its state lock, so queue order matches mutation
//! order. Two worker tasks drain the queues outside the lock:
//!
//! - the notify worker delivers notifications one at a time, in order,
//!   from a bounded queue; when the queue is full new notifications are
//!   dropped with a warning;
//! - the storage worker writes archives and snapshots. A mutation only
//!   marks the state dirty; the worker takes one snapshot from its
//!   [`SnapshotSource`] when it gets to the write, so any number of
//!   mutations in between cost a single copy.
//!
//! Every call is bounded by a timeout. Failures and timeouts are logged
//! at `warn` and dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use madness_types::Notification;

use crate::notifier::Notifier;
use crate::snapshot::{RoundArchive, Snapshot};
use crate::storage::Storage;

/// Notifications that may wait for delivery before new ones are dropped.
pub const NOTIFY_QUEUE_CAPACITY: usize = 256;

/// Produces the snapshot the storage worker writes.
pub trait SnapshotSource: Send + Sync {
    /// The state as of now.
    fn snapshot(&self) -> BoxFuture<'static, Snapshot>;
}

impl<T: SnapshotSource + ?Sized> SnapshotSource for Arc<T> {
    fn snapshot(&self) -> BoxFuture<'static, Snapshot> {
        (**self).snapshot()
    }
}

enum NotifyJob {
    Send(Notification),
    Barrier(oneshot::Sender<()>),
}

enum StoreJob {
    Save,
    Archive(Arc<RoundArchive>),
    Barrier(oneshot::Sender<()>),
}

/// Per-call bounds for the two workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTimeouts {
    /// Bound on one notification delivery.
    pub notify: Duration,
    /// Bound on one storage write.
    pub store: Duration,
}

impl DispatchTimeouts {
    /// The same bound for both workers.
    pub const fn uniform(timeout: Duration) -> Self {
        Self {
            notify: timeout,
            store: timeout,
        }
    }
}

impl Default for DispatchTimeouts {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(5))
    }
}

/// Handle to the outbound queues.
#[derive(Debug)]
pub struct Outbox {
    notify_tx: mpsc::Sender<NotifyJob>,
    store_tx: mpsc::UnboundedSender<StoreJob>,
    dirty: Arc<AtomicBool>,
    workers: [JoinHandle<()>; 2],
}

impl core::fmt::Debug for NotifyJob {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Send(n) => write!(f, "Send({})", n.kind()),
            Self::Barrier(_) => f.write_str("Barrier"),
        }
    }
}

impl core::fmt::Debug for StoreJob {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Save => f.write_str("Save"),
            Self::Archive(a) => write!(f, "Archive({})", a.snapshot_ref),
            Self::Barrier(_) => f.write_str("Barrier"),
        }
    }
}

impl Outbox {
    /// Spawn both workers on the current tokio runtime with the default
    /// notification queue capacity.
    pub fn spawn(
        notifier: Arc<dyn Notifier>,
        storage: Arc<dyn Storage>,
        snapshots: Arc<dyn SnapshotSource>,
        timeouts: DispatchTimeouts,
    ) -> Self {
        Self::with_capacity(notifier, storage, snapshots, timeouts, NOTIFY_QUEUE_CAPACITY)
    }

    /// Spawn both workers with room for `notify_capacity` undelivered
    /// notifications.
    pub fn with_capacity(
        notifier: Arc<dyn Notifier>,
        storage: Arc<dyn Storage>,
        snapshots: Arc<dyn SnapshotSource>,
        timeouts: DispatchTimeouts,
        notify_capacity: usize,
    ) -> Self {
        let (notify_tx, notify_rx) = mpsc::channel(notify_capacity.max(1));
        let (store_tx, store_rx) = mpsc::unbounded_channel();
        let dirty = Arc::new(AtomicBool::new(false));
        let store = StoreWorker {
            storage,
            snapshots,
            dirty: Arc::clone(&dirty),
            call_timeout: timeouts.store,
        };
        let workers = [
            tokio::spawn(notify_worker(notify_rx, notifier, timeouts.notify)),
            tokio::spawn(store.run(store_rx)),
        ];
        Self {
            notify_tx,
            store_tx,
            dirty,
            workers,
        }
    }

    /// Queue a notification. Returns `false` if it was dropped because
    /// the queue is full or the worker stopped.
    pub fn notify(&self, notification: Notification) -> bool {
        match self.notify_tx.try_send(NotifyJob::Send(notification)) {
            Ok(()) => true,
            Err(TrySendError::Full(NotifyJob::Send(dropped))) => {
                warn!(
                    kind = dropped.kind(),
                    capacity = self.notify_tx.max_capacity(),
                    "notification queue full, dropping notification"
                );
                false
            }
            Err(_) => {
                warn!("notification worker stopped, dropping notification");
                false
            }
        }
    }

    /// Mark the state dirty. The storage worker writes a fresh snapshot
    /// once it reaches the mark; marks made before that write share it.
    pub fn save(&self) {
        if self.dirty.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.store_tx.send(StoreJob::Save).is_err() {
            warn!("storage worker stopped, dropping snapshot");
        }
    }

    /// Queue a finished round for archiving.
    pub fn archive(&self, archive: RoundArchive) {
        if self
            .store_tx
            .send(StoreJob::Archive(Arc::new(archive)))
            .is_err()
        {
            warn!("storage worker stopped, dropping round archive");
        }
    }

    /// Wait until every job queued before this call has been handled.
    pub async fn flush(&self) {
        let (notify_done, notify_wait) = oneshot::channel();
        let (store_done, store_wait) = oneshot::channel();
        if self
            .notify_tx
            .send(NotifyJob::Barrier(notify_done))
            .await
            .is_ok()
        {
            let _ = notify_wait.await;
        }
        if self.store_tx.send(StoreJob::Barrier(store_done)).is_ok() {
            let _ = store_wait.await;
        }
    }
}

impl Drop for Outbox {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

async fn notify_worker(
    mut rx: mpsc::Receiver<NotifyJob>,
    notifier: Arc<dyn Notifier>,
    call_timeout: Duration,
) {
    while let Some(job) = rx.recv().await {
        match job {
            NotifyJob::Send(notification) => {
                let kind = notification.kind();
                match tokio::time::timeout(call_timeout, notifier.notify(&notification)).await {
                    Ok(Ok(())) => debug!(kind, "notification delivered"),
                    Ok(Err(e)) => warn!(kind, error = %e, "notification failed"),
                    Err(_) => warn!(kind, ?call_timeout, "notification timed out"),
                }
            }
            NotifyJob::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
}

struct StoreWorker {
    storage: Arc<dyn Storage>,
    snapshots: Arc<dyn SnapshotSource>,
    dirty: Arc<AtomicBool>,
    call_timeout: Duration,
}

impl StoreWorker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<StoreJob>) {
        let call_timeout = self.call_timeout;
        while let Some(job) = rx.recv().await {
            match job {
                StoreJob::Save => {
                    // Clear before reading so a mutation racing the read
                    // queues another write.
                    self.dirty.store(false, Ordering::Release);
                    let snapshot = Arc::new(self.snapshots.snapshot().await);
                    match tokio::time::timeout(call_timeout, self.storage.save(snapshot)).await {
                        Ok(Ok(())) => debug!("snapshot saved"),
                        Ok(Err(e)) => warn!(error = %e, "snapshot save failed"),
                        Err(_) => warn!(?call_timeout, "snapshot save timed out"),
                    }
                }
                StoreJob::Archive(archive) => {
                    let snapshot_ref = archive.snapshot_ref.clone();
                    match tokio::time::timeout(call_timeout, self.storage.archive(archive)).await {
                        Ok(Ok(())) => debug!(snapshot_ref, "round archived"),
                        Ok(Err(e)) => warn!(snapshot_ref, error = %e, "round archive failed"),
                        Err(_) => warn!(snapshot_ref, ?call_timeout, "round archive timed out"),
                    }
                }
                StoreJob::Barrier(done) => {
                    let _ = done.send(());
                }
            }
        }
    }
}
