//! Outbound notification seam.
//!
//! The engine produces [`Notification`] values; a [`Notifier`] turns them
//! into something humans see. Delivery runs on the dispatch worker, never
//! under the engine lock, and failures are logged by the worker.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{self, BoxFuture, FutureExt};
use tracing::info;

use madness_types::Notification;

/// Errors from delivering a notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The request could not be sent or the response could not be read.
    #[error("notification transport failed: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },

    /// The remote side answered with a non-success status.
    #[error("notification rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The message body could not be rendered.
    #[error("failed to render notification: {message}")]
    Render {
        /// Description of the failure.
        message: String,
    },
}

/// A destination for engine notifications.
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if delivery fails. The dispatcher logs the
    /// error and moves on to the next notification.
    fn notify(&self, notification: &Notification) -> BoxFuture<'static, Result<(), NotifyError>>;
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, notification: &Notification) -> BoxFuture<'static, Result<(), NotifyError>> {
        (**self).notify(notification)
    }
}

/// A notifier that only writes to the log.
///
/// Used when no chat credentials are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> BoxFuture<'static, Result<(), NotifyError>> {
        info!(kind = notification.kind(), ?notification, "notification");
        future::ready(Ok(())).boxed()
    }
}

/// A notifier that keeps every notification in memory.
///
/// Recording happens synchronously inside [`Notifier::notify`], so once
/// the dispatch queue is flushed, [`RecordingNotifier::notifications`]
/// reflects every delivered notification in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    /// Create a notifier that records and succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a notifier that records and then reports a failure.
    pub fn failing() -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Everything delivered so far.
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Labels of everything delivered so far, in order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(Notification::kind)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) -> BoxFuture<'static, Result<(), NotifyError>> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
        let result = if self.fail {
            Err(NotifyError::Transport {
                message: "recording notifier configured to fail".to_owned(),
            })
        } else {
            Ok(())
        };
        future::ready(result).boxed()
    }
}
