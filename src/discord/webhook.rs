//! Channel binding and webhook delivery on the Discord side.
//!
//! Relayed Slack messages are posted through a channel webhook so each one
//! can carry the original author's name and avatar. The webhook is found or
//! created once at startup; its id marks every message the bridge produces.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serenity::builder::{CreateAllowedMentions, CreateEmbed, CreateWebhook, ExecuteWebhook};
use serenity::http::Http;
use serenity::model::channel::{Channel, ChannelType};
use serenity::model::id::{ChannelId, GuildId, UserId};
use serenity::model::webhook::Webhook;
use tracing::info;

use crate::bridge::formatter::{clamp_chars, DISCORD_CONTENT_LIMIT, DISCORD_USERNAME_LIMIT};
use crate::bridge::sender::OutboundSender;
use crate::common::error::{ConfigError, RelayError, RelayResult};
use crate::common::remote::bounded;
use crate::common::NormalizedMessage;

/// Whether messages can be relayed into a channel of this kind.
pub fn is_relay_capable(kind: ChannelType) -> bool {
    kind == ChannelType::Text
}

/// Check that the configured channel is a guild text channel and return its guild.
pub async fn bind_channel(http: &Arc<Http>, channel_id: ChannelId) -> Result<GuildId, ConfigError> {
    let channel = http
        .get_channel(channel_id)
        .await
        .map_err(RelayError::from)?;

    match channel {
        Channel::Guild(guild_channel) if is_relay_capable(guild_channel.kind) => {
            Ok(guild_channel.guild_id)
        }
        _ => Err(ConfigError::NotMessageCapable {
            channel_id: channel_id.get(),
        }),
    }
}

/// Pick the webhook owned by the bot among a channel's webhooks.
pub fn find_own_webhook(webhooks: Vec<Webhook>, self_user_id: UserId) -> Option<Webhook> {
    webhooks
        .into_iter()
        .find(|w| w.user.as_ref().map(|u| u.id) == Some(self_user_id))
}

/// Find the bot's webhook in the channel, creating one if none exists.
pub async fn ensure_webhook(
    http: &Arc<Http>,
    channel_id: ChannelId,
    self_user_id: UserId,
    name: &str,
) -> Result<Webhook, ConfigError> {
    let webhook_error = |e: serenity::Error| ConfigError::Webhook {
        channel_id: channel_id.get(),
        message: e.to_string(),
    };

    let existing = channel_id.webhooks(http).await.map_err(webhook_error)?;
    if let Some(webhook) = find_own_webhook(existing, self_user_id) {
        info!("Using existing webhook {} in channel {}", webhook.id, channel_id);
        return Ok(webhook);
    }

    info!("Webhook not found, creating '{}' in channel {}", name, channel_id);
    channel_id
        .create_webhook(http, CreateWebhook::new(name))
        .await
        .map_err(webhook_error)
}

/// Build the webhook payload for a relayed message.
pub fn build_execute(message: &NormalizedMessage) -> ExecuteWebhook {
    let embeds = message
        .images
        .iter()
        .map(|image| CreateEmbed::new().image(&image.url))
        .collect();

    let mut execute = ExecuteWebhook::new()
        .username(clamp_chars(&message.author.display_name, DISCORD_USERNAME_LIMIT))
        .content(clamp_chars(&message.text, DISCORD_CONTENT_LIMIT))
        .embeds(embeds)
        .allowed_mentions(CreateAllowedMentions::new());

    if let Some(avatar_url) = &message.author.avatar_url {
        execute = execute.avatar_url(avatar_url);
    }
    execute
}

/// Sends relayed messages through the channel webhook.
pub struct WebhookSender {
    http: Arc<Http>,
    webhook: Webhook,
    timeout: Duration,
}

impl WebhookSender {
    pub fn new(http: Arc<Http>, webhook: Webhook, timeout: Duration) -> Self {
        Self {
            http,
            webhook,
            timeout,
        }
    }
}

#[async_trait]
impl OutboundSender for WebhookSender {
    async fn send(&self, message: &NormalizedMessage) -> RelayResult<()> {
        let execute = build_execute(message);
        bounded("Discord webhook send", self.timeout, async {
            self.webhook.execute(&self.http, false, execute).await?;
            Ok(())
        })
        .await
    }
}
