//! Channel binding at startup.
//!
//! Discord is bound first: the channel must be a guild text channel before
//! the webhook is looked up or created, and Slack is only contacted once the
//! Discord side is ready. Any failure here is fatal.

use std::sync::Arc;

use serenity::http::Http;
use serenity::model::id::{ChannelId, UserId};
use serenity::model::webhook::Webhook;
use tracing::{info, warn};

use crate::bridge::state::{ChannelBinding, RelayOrigin};
use crate::common::error::ConfigError;
use crate::config::Config;
use crate::discord::webhook::{bind_channel, ensure_webhook};
use crate::slack::api::SlackApi;

/// Both ends of the bridge, ready for relaying.
pub struct BoundChannels {
    pub binding: ChannelBinding,
    pub origin: RelayOrigin,
    /// Webhook relayed Slack messages are posted through.
    pub webhook: Webhook,
}

/// Bind the configured Discord and Slack channels.
pub async fn bind_channels(
    http: &Arc<Http>,
    self_user_id: UserId,
    slack: &SlackApi,
    config: &Config,
) -> Result<BoundChannels, ConfigError> {
    let discord_channel = ChannelId::new(config.discord.channel_id);
    let guild_id = bind_channel(http, discord_channel).await?;
    info!("Bound Discord channel {} in guild {}", discord_channel, guild_id);

    let webhook = ensure_webhook(
        http,
        discord_channel,
        self_user_id,
        &config.discord.webhook_name,
    )
    .await?;

    let identity = slack.auth_test().await?;
    info!("Slack bot authenticated as {}", identity.user_id);
    if identity.bot_id.is_none() {
        warn!("Slack token has no bot id; echo detection relies on the channel binding alone");
    }

    let conversation = slack.resolve_channel(&config.slack.channel).await?;
    info!("Bound Slack channel #{} ({})", conversation.name, conversation.id);

    Ok(BoundChannels {
        binding: ChannelBinding {
            slack_channel_id: conversation.id,
            discord_channel_id: discord_channel,
            discord_guild_id: guild_id,
        },
        origin: RelayOrigin {
            discord_webhook_id: webhook.id,
            slack_bot_id: identity.bot_id,
        },
        webhook,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serenity::http::HttpBuilder;
    use serenity::model::id::{GuildId, WebhookId};
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    const CHANNEL_PATH: &str = "/api/v10/channels/100";
    const WEBHOOKS_PATH: &str = "/api/v10/channels/100/webhooks";

    /// Discord REST client whose requests all go to the mock server.
    fn discord_http(server: &MockServer) -> Arc<Http> {
        Arc::new(
            HttpBuilder::new("discord-token")
                .proxy(server.uri())
                .ratelimiter_disabled(true)
                .build(),
        )
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.discord.channel_id = 100;
        config.slack.channel = "C0FFEE123".to_string();
        config
    }

    async fn mount_channel(server: &MockServer, kind: u8) {
        Mock::given(matchers::method("GET"))
            .and(matchers::path(CHANNEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "100",
                "type": kind,
                "guild_id": "1",
                "name": "lounge",
                "position": 0,
                "permission_overwrites": [],
                "nsfw": false
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_non_text_channel_stops_before_webhook_and_slack() {
        // 2 = voice, 4 = category
        for kind in [2u8, 4] {
            let discord = MockServer::start().await;
            let slack = MockServer::start().await;

            mount_channel(&discord, kind).await;
            Mock::given(matchers::path(WEBHOOKS_PATH))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
                .expect(0)
                .mount(&discord)
                .await;
            Mock::given(matchers::any())
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
                .expect(0)
                .mount(&slack)
                .await;

            let slack_api = SlackApi::with_base_url(&slack.uri(), "xoxb-test", "xapp-test");
            let result =
                bind_channels(&discord_http(&discord), UserId::new(9), &slack_api, &config()).await;

            match result {
                Err(ConfigError::NotMessageCapable { channel_id }) => assert_eq!(channel_id, 100),
                Err(e) => panic!("expected NotMessageCapable for type {}, got {}", kind, e),
                Ok(_) => panic!("expected NotMessageCapable for type {}", kind),
            }
        }
    }

    #[tokio::test]
    async fn test_text_channel_binds_both_sides() {
        let discord = MockServer::start().await;
        let slack = MockServer::start().await;

        mount_channel(&discord, 0).await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path(WEBHOOKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&discord)
            .await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path(WEBHOOKS_PATH))
            .and(matchers::body_partial_json(json!({"name": "Coffee Break Sync"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "555",
                "type": 1,
                "channel_id": "100",
                "guild_id": "1",
                "name": "Coffee Break Sync",
                "token": "webhook-token"
            })))
            .expect(1)
            .mount(&discord)
            .await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/auth.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "user_id": "U0BR1DGE",
                "bot_id": "B0BR1DGE"
            })))
            .expect(1)
            .mount(&slack)
            .await;

        let slack_api = SlackApi::with_base_url(&slack.uri(), "xoxb-test", "xapp-test");
        let bound = bind_channels(&discord_http(&discord), UserId::new(9), &slack_api, &config())
            .await
            .unwrap();

        assert_eq!(bound.binding.discord_channel_id, ChannelId::new(100));
        assert_eq!(bound.binding.discord_guild_id, GuildId::new(1));
        assert_eq!(bound.binding.slack_channel_id, "C0FFEE123");
        assert_eq!(bound.origin.discord_webhook_id, WebhookId::new(555));
        assert_eq!(bound.origin.slack_bot_id.as_deref(), Some("B0BR1DGE"));
        assert_eq!(bound.webhook.id, WebhookId::new(555));
    }

    #[tokio::test]
    async fn test_slack_failure_after_discord_binding_is_fatal() {
        let discord = MockServer::start().await;
        let slack = MockServer::start().await;

        mount_channel(&discord, 0).await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path(WEBHOOKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&discord)
            .await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path(WEBHOOKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "555",
                "type": 1,
                "channel_id": "100",
                "name": "Coffee Break Sync"
            })))
            .mount(&discord)
            .await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/auth.test"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "invalid_auth"})),
            )
            .expect(1)
            .mount(&slack)
            .await;

        let slack_api = SlackApi::with_base_url(&slack.uri(), "xoxb-test", "xapp-test");
        let result =
            bind_channels(&discord_http(&discord), UserId::new(9), &slack_api, &config()).await;

        assert!(matches!(result, Err(ConfigError::Startup(_))));
    }
}
