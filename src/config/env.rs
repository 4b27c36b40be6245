//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `SWITCHBOARD_SLACK_BOT_TOKEN` - Slack bot token (`xoxb-...`)
//! - `SWITCHBOARD_SLACK_APP_TOKEN` - Slack app-level token (`xapp-...`)
//! - `SWITCHBOARD_SLACK_CHANNEL` - Slack channel name or id
//! - `SWITCHBOARD_DISCORD_TOKEN` - Discord bot token
//! - `SWITCHBOARD_DISCORD_CHANNEL_ID` - Discord channel id

use std::env;

use tracing::warn;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "SWITCHBOARD";

/// Apply environment variable overrides to a config.
///
/// This allows tokens to be provided via environment variables instead of
/// the config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    // Slack credentials and channel
    if let Ok(token) = env::var(format!("{}_SLACK_BOT_TOKEN", ENV_PREFIX)) {
        config.slack.bot_token = token;
    }
    if let Ok(token) = env::var(format!("{}_SLACK_APP_TOKEN", ENV_PREFIX)) {
        config.slack.app_token = token;
    }
    if let Ok(channel) = env::var(format!("{}_SLACK_CHANNEL", ENV_PREFIX)) {
        config.slack.channel = channel;
    }

    // Discord credentials and channel
    if let Ok(token) = env::var(format!("{}_DISCORD_TOKEN", ENV_PREFIX)) {
        config.discord.token = token;
    }
    if let Ok(channel_id) = env::var(format!("{}_DISCORD_CHANNEL_ID", ENV_PREFIX)) {
        match channel_id.trim().parse() {
            Ok(id) => config.discord.channel_id = id,
            Err(_) => warn!(
                "Ignoring {}_DISCORD_CHANNEL_ID: '{}' is not a channel id",
                ENV_PREFIX, channel_id
            ),
        }
    }

    config
}

/// Check if any required environment variables are set but empty.
///
/// Returns a list of variable names that are set but empty.
pub fn check_empty_env_vars() -> Vec<String> {
    let vars = [
        format!("{}_SLACK_BOT_TOKEN", ENV_PREFIX),
        format!("{}_SLACK_APP_TOKEN", ENV_PREFIX),
        format!("{}_DISCORD_TOKEN", ENV_PREFIX),
    ];

    vars.into_iter()
        .filter(|var| env::var(var).map(|v| v.is_empty()).unwrap_or(false))
        .collect()
}

/// Get the config file path from environment or use default.
///
/// Checks `SWITCHBOARD_CONFIG` environment variable, otherwise returns "switchboard.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "switchboard.conf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_prefix() {
        assert_eq!(ENV_PREFIX, "SWITCHBOARD");
    }

    #[test]
    fn test_get_config_path_default() {
        env::remove_var("SWITCHBOARD_CONFIG");
        assert_eq!(get_config_path(), "switchboard.conf");
    }

    #[test]
    fn test_apply_env_overrides() {
        env::remove_var("SWITCHBOARD_SLACK_BOT_TOKEN");
        env::remove_var("SWITCHBOARD_SLACK_APP_TOKEN");
        env::remove_var("SWITCHBOARD_SLACK_CHANNEL");
        env::remove_var("SWITCHBOARD_DISCORD_TOKEN");
        env::remove_var("SWITCHBOARD_DISCORD_CHANNEL_ID");

        let mut config = Config::default();
        config.discord.token = "original_token".to_string();
        config.discord.channel_id = 5;

        // Nothing set: unchanged
        let config = apply_env_overrides(config);
        assert_eq!(config.discord.token, "original_token");
        assert_eq!(config.discord.channel_id, 5);

        env::set_var("SWITCHBOARD_SLACK_CHANNEL", "coffee-break");
        env::set_var("SWITCHBOARD_DISCORD_CHANNEL_ID", "987654321");
        let config = apply_env_overrides(config);
        assert_eq!(config.slack.channel, "coffee-break");
        assert_eq!(config.discord.channel_id, 987654321);

        // Unparseable ids are ignored
        env::set_var("SWITCHBOARD_DISCORD_CHANNEL_ID", "general");
        let config = apply_env_overrides(config);
        assert_eq!(config.discord.channel_id, 987654321);

        env::remove_var("SWITCHBOARD_SLACK_CHANNEL");
        env::remove_var("SWITCHBOARD_DISCORD_CHANNEL_ID");
    }
}
