//! Bridge state established at startup.
//!
//! The initialization flow is:
//! 1. Validate the Discord channel and derive its guild (`discord::webhook::bind_channel`)
//! 2. Ensure the channel webhook exists; its id becomes the `RelayOrigin`
//! 3. Resolve the Slack channel name to an id (`slack::api::SlackApi::resolve_channel`)
//! 4. Build the immutable `ChannelBinding` and hand both to the router

use std::time::Duration;

use serenity::model::id::{ChannelId, GuildId, WebhookId};

use crate::common::{DiscordEvent, InboundEvent, SlackEvent};
use crate::config::types::RelayConfig;

/// The single Slack/Discord channel pair this process bridges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBinding {
    pub slack_channel_id: String,
    pub discord_channel_id: ChannelId,
    /// Guild owning the Discord channel; scopes the emoji cache.
    pub discord_guild_id: GuildId,
}

impl ChannelBinding {
    /// Whether the event was posted in the bound channel of its platform.
    pub fn is_bound(&self, event: &InboundEvent) -> bool {
        match event {
            InboundEvent::Slack(e) => e.channel() == self.slack_channel_id,
            InboundEvent::Discord(e) => e.channel_id() == self.discord_channel_id,
        }
    }
}

/// Sender identifiers the bridge itself posts under.
///
/// Computed once at startup. Any inbound message carrying one of these is an
/// echo of our own relay and must never be forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOrigin {
    pub discord_webhook_id: WebhookId,
    /// `bot_id` of the Slack app, from `auth.test`.
    pub slack_bot_id: Option<String>,
}

impl RelayOrigin {
    /// Whether the event was produced by the bridge's own outbound send.
    pub fn is_echo(&self, event: &InboundEvent) -> bool {
        match event {
            InboundEvent::Slack(SlackEvent::Bot { bot_id, .. }) => {
                self.slack_bot_id.as_deref() == Some(bot_id.as_str())
            }
            InboundEvent::Discord(DiscordEvent::Bot { webhook_id, .. }) => {
                *webhook_id == Some(self.discord_webhook_id)
            }
            _ => false,
        }
    }
}

/// Relay settings derived from configuration.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub placeholder: String,
    pub slack_name_format: String,
    pub discord_name_format: String,
    pub remote_timeout: Duration,
    pub send_retries: usize,
}

impl RelaySettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            placeholder: config.placeholder.clone(),
            slack_name_format: config.slack_name_format.clone(),
            discord_name_format: config.discord_name_format.clone(),
            remote_timeout: Duration::from_secs(config.remote_timeout_secs),
            send_retries: config.send_retries,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}
