// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discord webhook client.
//!
//! Content is truncated to the channel's length ceiling at the transport
//! call; the persisted log row keeps the full logical content.

use std::borrow::Cow;

use courier_core::{CourierError, Integration};

/// Discord's hard limit on webhook message content.
pub const DISCORD_MAX_CONTENT_LEN: usize = 2000;

/// Typed Discord credentials parsed from an integration's credential map.
#[derive(Debug, Clone)]
pub struct DiscordCredentials {
    pub webhook_url: String,
}

impl DiscordCredentials {
    pub fn from_integration(integration: &Integration) -> Result<Self, CourierError> {
        let webhook_url = integration
            .credential("webhookUrl")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                CourierError::Config("Discord integration missing webhook URL.".into())
            })?
            .to_string();
        Ok(Self { webhook_url })
    }
}

/// Thin client for executing Discord webhooks.
#[derive(Clone, Default)]
pub struct DiscordWebhook {
    http: reqwest::Client,
}

impl DiscordWebhook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post `content` to the webhook. One call, one attempt.
    pub async fn execute(&self, webhook_url: &str, content: &str) -> Result<(), CourierError> {
        let outgoing = truncate_content(content);
        if let Cow::Owned(_) = outgoing {
            tracing::debug!(
                full_len = content.chars().count(),
                sent_len = DISCORD_MAX_CONTENT_LEN,
                "discord content truncated to channel ceiling"
            );
        }

        let response = self
            .http
            .post(webhook_url)
            .json(&serde_json::json!({ "content": outgoing.as_ref() }))
            .send()
            .await
            .map_err(|e| CourierError::Delivery {
                message: format!("Discord webhook failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CourierError::delivery(format!(
                "Discord webhook failed ({status}): {body}"
            )));
        }
        Ok(())
    }
}

/// Truncate to [`DISCORD_MAX_CONTENT_LEN`] characters, multibyte-safe.
fn truncate_content(content: &str) -> Cow<'_, str> {
    if content.chars().count() <= DISCORD_MAX_CONTENT_LEN {
        Cow::Borrowed(content)
    } else {
        Cow::Owned(content.chars().take(DISCORD_MAX_CONTENT_LEN).collect())
    }
}
