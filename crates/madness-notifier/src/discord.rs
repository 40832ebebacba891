//! Discord REST delivery.
//!
//! One notification becomes one channel message carrying one embed:
//! `POST {api_base}/channels/{channel_id}/messages` with
//! `Authorization: Bot {token}`.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use tracing::debug;

use madness_core::notifier::{Notifier, NotifyError};
use madness_types::Notification;

use crate::render::EmbedRenderer;

/// Longest error body kept in a [`NotifyError::Rejected`].
const MAX_ERROR_BODY: usize = 512;

/// Posts embeds to a Discord channel.
#[derive(Clone)]
pub struct DiscordNotifier {
    client: reqwest::Client,
    url: Arc<str>,
    authorization: Arc<str>,
    renderer: Arc<EmbedRenderer>,
}

impl core::fmt::Debug for DiscordNotifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DiscordNotifier")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl DiscordNotifier {
    /// Create a notifier for one channel.
    pub fn new(
        api_base: &str,
        token: &str,
        channel_id: &str,
        timeout: Duration,
        renderer: EmbedRenderer,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            url: messages_url(api_base, channel_id).into(),
            authorization: format!("Bot {token}").into(),
            renderer: Arc::new(renderer),
        })
    }

    /// The endpoint messages are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// `{api_base}/channels/{channel_id}/messages`, tolerating a trailing
/// slash on the base.
pub fn messages_url(api_base: &str, channel_id: &str) -> String {
    format!(
        "{}/channels/{}/messages",
        api_base.trim_end_matches('/'),
        channel_id.trim()
    )
}

impl Notifier for DiscordNotifier {
    fn notify(&self, notification: &Notification) -> BoxFuture<'static, Result<(), NotifyError>> {
        let embed = match self.renderer.render(notification) {
            Ok(embed) => embed,
            Err(e) => return future::ready(Err(e)).boxed(),
        };
        let body = serde_json::json!({ "embeds": [embed] });
        let request = self
            .client
            .post(self.url.as_ref())
            .header("Authorization", self.authorization.as_ref())
            .json(&body);
        let kind = notification.kind();

        async move {
            let response = request.send().await.map_err(|e| NotifyError::Transport {
                message: format!("Discord request failed: {e}"),
            })?;

            let status = response.status();
            if !status.is_success() {
                let mut error_body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unable to read error body".to_owned());
                truncate_on_char_boundary(&mut error_body, MAX_ERROR_BODY);
                return Err(NotifyError::Rejected {
                    status: status.as_u16(),
                    body: error_body,
                });
            }

            debug!(kind, %status, "posted to Discord");
            Ok(())
        }
        .boxed()
    }
}

fn truncate_on_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let cut = (0..=max)
        .rev()
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(0);
    text.truncate(cut);
}
