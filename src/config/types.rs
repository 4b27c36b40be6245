//! Configuration type definitions.

use serde::Deserialize;

/// Default Discord webhook name used when the bridge has to create one.
pub const DEFAULT_WEBHOOK_NAME: &str = "Coffee Break Sync";

/// Default Discord presence activity.
pub const DEFAULT_PRESENCE: &str = "linking friends across ecosystems";

/// Text sent in place of an empty message body.
pub const DEFAULT_PLACEHOLDER: &str = "<Image only message>";

/// Default author format for Slack -> Discord messages.
pub const DEFAULT_SLACK_NAME_FORMAT: &str = "%user (Slack)";

/// Default author format for Discord -> Slack messages.
pub const DEFAULT_DISCORD_NAME_FORMAT: &str = "%user (Discord)";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub slack: SlackConfig,
    pub discord: DiscordConfig,
    pub relay: RelayConfig,
    pub filters: Option<FiltersConfig>,
}

/// Slack workspace connection configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Bot user OAuth token (`xoxb-...`) for the Web API.
    pub bot_token: String,
    /// App-level token (`xapp-...`) for Socket Mode.
    pub app_token: String,
    /// Channel name (with or without `#`) or channel id.
    pub channel: String,
}

/// Discord bot configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub token: String,
    pub channel_id: u64,
    /// Name given to the webhook when one has to be created.
    pub webhook_name: String,
    /// Activity shown in the bot's presence while running.
    pub presence: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            channel_id: 0,
            webhook_name: DEFAULT_WEBHOOK_NAME.to_string(),
            presence: DEFAULT_PRESENCE.to_string(),
        }
    }
}

/// Relay pipeline behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Sent instead of an empty body (image-only messages).
    pub placeholder: String,
    /// Author format for messages going to Discord. Supports `%user` and `%platform`.
    pub slack_name_format: String,
    /// Author format for messages going to Slack. Supports `%user` and `%platform`.
    pub discord_name_format: String,
    /// Upper bound for any single remote call.
    pub remote_timeout_secs: u64,
    /// Extra send attempts after a failed send. 0 disables retrying.
    pub send_retries: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            slack_name_format: DEFAULT_SLACK_NAME_FORMAT.to_string(),
            discord_name_format: DEFAULT_DISCORD_NAME_FORMAT.to_string(),
            remote_timeout_secs: 10,
            send_retries: 0,
        }
    }
}

/// Message filtering configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FiltersConfig {
    pub enabled: bool,
    /// Patterns blocking Slack messages from reaching Discord.
    pub slack_to_discord: Option<Vec<String>>,
    /// Patterns blocking Discord messages from reaching Slack.
    pub discord_to_slack: Option<Vec<String>>,
}
