//! Configuration file parsing (HOCON format).

use std::path::Path;

use hocon::HoconLoader;

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Load configuration from a HOCON file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.display().to_string(),
        source: e,
    })?;
    load_config_str(&content)
}

/// Load configuration from a HOCON string.
pub fn load_config_str(content: &str) -> Result<Config, ConfigError> {
    HoconLoader::new()
        .load_str(content)
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{DEFAULT_PLACEHOLDER, DEFAULT_WEBHOOK_NAME};

    #[test]
    fn test_load_full_config() {
        let config = load_config_str(
            r#"
            slack {
              bot_token = "xoxb-1"
              app_token = "xapp-1"
              channel = "coffee-break"
            }
            discord {
              token = "discord-token"
              channel_id = 123456789
              webhook_name = "Bridge"
            }
            relay {
              remote_timeout_secs = 5
              send_retries = 2
            }
            filters {
              enabled = true
              slack_to_discord = ["^spam$"]
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.slack.channel, "coffee-break");
        assert_eq!(config.discord.channel_id, 123456789);
        assert_eq!(config.discord.webhook_name, "Bridge");
        assert_eq!(config.relay.remote_timeout_secs, 5);
        assert_eq!(config.relay.send_retries, 2);
        assert_eq!(config.relay.placeholder, DEFAULT_PLACEHOLDER);

        let filters = config.filters.unwrap();
        assert!(filters.enabled);
        assert_eq!(filters.slack_to_discord, Some(vec!["^spam$".to_string()]));
        assert_eq!(filters.discord_to_slack, None);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = load_config_str(r#"slack { channel = "general" }"#).unwrap();

        assert_eq!(config.slack.channel, "general");
        assert!(config.slack.bot_token.is_empty());
        assert_eq!(config.discord.webhook_name, DEFAULT_WEBHOOK_NAME);
        assert_eq!(config.relay.remote_timeout_secs, 10);
        assert!(config.filters.is_none());
    }

    #[test]
    fn test_missing_file_fails() {
        let result = load_config("/definitely/not/here/switchboard.conf");
        assert!(matches!(result, Err(ConfigError::IoError { .. })));
    }

    #[test]
    fn test_load_config_from_file() {
        let path = std::env::temp_dir().join(format!("switchboard-{}.conf", std::process::id()));
        std::fs::write(&path, r#"discord { channel_id = 42 }"#).unwrap();

        let config = load_config(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.unwrap().discord.channel_id, 42);
    }
}
