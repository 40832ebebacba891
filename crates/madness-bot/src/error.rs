//! Error types for the bot binary.

/// Top-level error for the bot binary.
///
/// Each variant wraps one subsystem's error so `main` can propagate with
/// `?`.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: madness_core::config::ConfigError,
    },

    /// The persisted state could not be read.
    #[error("storage error: {source}")]
    Storage {
        /// The underlying storage error.
        #[from]
        source: madness_core::storage::StorageError,
    },

    /// The notifier could not be built.
    #[error("notifier error: {source}")]
    Notifier {
        /// The underlying notifier error.
        #[from]
        source: madness_core::notifier::NotifyError,
    },

    /// The HTTP server failed to start or crashed.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: madness_observer::ServerError,
    },

    /// Logging could not be initialized.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the failure.
        message: String,
    },
}
