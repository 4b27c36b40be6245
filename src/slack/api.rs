//! Minimal Slack Web API wrapper.
//!
//! Covers the handful of methods the bridge needs: identity (`auth.test`),
//! profiles, channel lookup, posting and opening a Socket Mode connection.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::common::error::{ConfigError, RelayError, RelayResult};

/// Slack Web API base URL.
pub const SLACK_API_BASE: &str = "https://slack.com/api";

/// Page size for `conversations.list`.
const CONVERSATIONS_PAGE_LIMIT: &str = "200";

/// Identity of the token owner, from `auth.test`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AuthIdentity {
    pub user_id: String,
    /// Present for bot tokens; messages the app posts carry this id.
    #[serde(default)]
    pub bot_id: Option<String>,
}

/// Subset of `users.profile.get` the bridge reads.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    #[serde(default)]
    pub display_name_normalized: String,
    #[serde(default)]
    pub real_name_normalized: String,
    #[serde(default)]
    pub image_192: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    profile: UserProfile,
}

/// A channel as listed by `conversations.list`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ConversationsPage {
    #[serde(default)]
    channels: Vec<Conversation>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct ConnectionsOpen {
    url: String,
}

/// Body of a `chat.postMessage` call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PostMessage {
    pub channel: String,
    pub text: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Value>,
}

/// Check the `ok` flag of a Web API response and decode the rest.
async fn parse_response<T: DeserializeOwned>(
    method: &'static str,
    resp: reqwest::Response,
) -> RelayResult<T> {
    let body: Value = resp.error_for_status()?.json().await?;
    if body["ok"].as_bool() != Some(true) {
        let error = body["error"].as_str().unwrap_or("unknown").to_string();
        return Err(RelayError::SlackApi { method, error });
    }

    serde_json::from_value(body).map_err(|e| RelayError::Malformed {
        message: format!("{} response: {}", method, e),
    })
}

/// Whether `value` is a Slack channel id rather than a channel name.
///
/// Channel names are lowercase, ids are uppercase alphanumerics starting
/// with `C` (public) or `G` (private).
pub fn looks_like_channel_id(value: &str) -> bool {
    value.len() >= 9
        && (value.starts_with('C') || value.starts_with('G'))
        && value
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

pub struct SlackApi {
    client: Client,
    base_url: String,
    bot_token: String,
    app_token: String,
}

impl SlackApi {
    pub fn new(bot_token: impl Into<String>, app_token: impl Into<String>) -> Self {
        Self::with_base_url(SLACK_API_BASE, bot_token, app_token)
    }

    /// Point the client at another API root; used against mock servers.
    pub fn with_base_url(
        base_url: &str,
        bot_token: impl Into<String>,
        app_token: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            app_token: app_token.into(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// `auth.test` with the bot token.
    pub async fn auth_test(&self) -> RelayResult<AuthIdentity> {
        let resp = self
            .client
            .post(self.url("auth.test"))
            .bearer_auth(&self.bot_token)
            .send()
            .await?;
        parse_response("auth.test", resp).await
    }

    /// `users.profile.get` for one user.
    pub async fn users_profile_get(&self, user_id: &str) -> RelayResult<UserProfile> {
        let resp = self
            .client
            .post(self.url("users.profile.get"))
            .bearer_auth(&self.bot_token)
            .form(&[("user", user_id)])
            .send()
            .await?;
        let parsed: ProfileResponse = parse_response("users.profile.get", resp).await?;
        Ok(parsed.profile)
    }

    /// `chat.postMessage` with the bot token.
    pub async fn chat_post_message(&self, message: &PostMessage) -> RelayResult<()> {
        let resp = self
            .client
            .post(self.url("chat.postMessage"))
            .bearer_auth(&self.bot_token)
            .json(message)
            .send()
            .await?;
        let _: Value = parse_response("chat.postMessage", resp).await?;
        Ok(())
    }

    /// `apps.connections.open` with the app-level token; returns the WebSocket URL.
    pub async fn apps_connections_open(&self) -> RelayResult<String> {
        let resp = self
            .client
            .post(self.url("apps.connections.open"))
            .bearer_auth(&self.app_token)
            .send()
            .await?;
        let parsed: ConnectionsOpen = parse_response("apps.connections.open", resp).await?;
        Ok(parsed.url)
    }

    /// One page of `conversations.list`; returns the channels and the next cursor.
    async fn conversations_page(
        &self,
        cursor: Option<&str>,
    ) -> RelayResult<(Vec<Conversation>, Option<String>)> {
        let mut form = vec![
            ("types", "public_channel,private_channel"),
            ("exclude_archived", "true"),
            ("limit", CONVERSATIONS_PAGE_LIMIT),
        ];
        if let Some(cursor) = cursor {
            form.push(("cursor", cursor));
        }

        let resp = self
            .client
            .post(self.url("conversations.list"))
            .bearer_auth(&self.bot_token)
            .form(&form)
            .send()
            .await?;
        let page: ConversationsPage = parse_response("conversations.list", resp).await?;

        let next = page
            .response_metadata
            .map(|m| m.next_cursor)
            .filter(|c| !c.is_empty());
        Ok((page.channels, next))
    }

    /// Resolve the configured channel to its id.
    ///
    /// Values that already look like a channel id are used as-is; otherwise
    /// the bot's visible channels are paged through looking for the name.
    pub async fn resolve_channel(&self, channel: &str) -> Result<Conversation, ConfigError> {
        let name = channel.trim_start_matches('#');
        if looks_like_channel_id(name) {
            return Ok(Conversation {
                id: name.to_string(),
                name: name.to_string(),
            });
        }

        let mut cursor: Option<String> = None;
        loop {
            let (channels, next) = self.conversations_page(cursor.as_deref()).await?;
            debug!(count = channels.len(), "Fetched conversations page");

            if let Some(found) = channels.into_iter().find(|c| c.name == name) {
                return Ok(found);
            }

            match next {
                Some(next) => cursor = Some(next),
                None => {
                    return Err(ConfigError::SlackChannelNotFound {
                        name: name.to_string(),
                    })
                }
            }
        }
    }
}
