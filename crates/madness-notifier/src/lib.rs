//! Notification delivery for the Monday Madness clan bot.
//!
//! # Modules
//!
//! - [`render`] -- Turns a [`Notification`](madness_types::Notification)
//!   into a Discord embed using `minijinja` templates.
//! - [`discord`] -- [`DiscordNotifier`], posting embeds over the Discord
//!   REST API with `reqwest`.
//!
//! [`build_notifier`] picks the Discord notifier when credentials are
//! configured and falls back to the log-only notifier otherwise.

pub mod discord;
pub mod render;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use madness_core::config::DiscordConfig;
use madness_core::notifier::{LogNotifier, Notifier, NotifyError};

pub use discord::DiscordNotifier;
pub use render::{Embed, EmbedField, EmbedRenderer};

/// Build the notifier described by `config`.
///
/// Returns a [`DiscordNotifier`] when both a bot token and a channel id
/// are set, otherwise a [`LogNotifier`].
///
/// # Errors
///
/// Returns [`NotifyError`] if an override template is unreadable or
/// invalid, or the HTTP client cannot be built.
pub fn build_notifier(config: &DiscordConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    let Some((token, channel_id)) = config.credentials() else {
        warn!("Discord credentials not configured, notifications will only be logged");
        return Ok(Arc::new(LogNotifier));
    };

    let renderer = match config.templates_dir.as_deref() {
        Some(dir) => EmbedRenderer::with_overrides(Path::new(dir))?,
        None => EmbedRenderer::builtin()?,
    };
    let notifier = DiscordNotifier::new(
        &config.api_base,
        token,
        channel_id,
        config.timeout(),
        renderer,
    )?;
    info!(url = notifier.url(), "Discord notifier ready");
    Ok(Arc::new(notifier))
}
