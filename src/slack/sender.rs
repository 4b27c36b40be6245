//! Posting relayed Discord messages into Slack.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::bridge::sender::OutboundSender;
use crate::common::error::RelayResult;
use crate::common::remote::bounded;
use crate::common::{ImageLink, NormalizedMessage};
use crate::slack::api::{PostMessage, SlackApi};

/// Slack rejects section block text longer than this.
const SECTION_TEXT_LIMIT: usize = 3000;

/// Posts messages to the bound Slack channel under a custom username and icon.
///
/// Requires the `chat:write.customize` scope.
pub struct SlackSender {
    api: Arc<SlackApi>,
    channel_id: String,
    timeout: Duration,
}

impl SlackSender {
    pub fn new(api: Arc<SlackApi>, channel_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api,
            channel_id: channel_id.into(),
            timeout,
        }
    }
}

#[async_trait]
impl OutboundSender for SlackSender {
    async fn send(&self, message: &NormalizedMessage) -> RelayResult<()> {
        let post = build_post(&self.channel_id, message);
        bounded("Slack post", self.timeout, self.api.chat_post_message(&post)).await
    }
}

/// Build the `chat.postMessage` body for a relayed message.
///
/// Messages with images get Block Kit blocks: the text in a section block,
/// then one image block per image.
pub fn build_post(channel_id: &str, message: &NormalizedMessage) -> PostMessage {
    let text = escape_text(&message.text);

    let blocks = if message.images.is_empty() {
        Vec::new()
    } else {
        let section_text: String = text.chars().take(SECTION_TEXT_LIMIT).collect();
        let mut blocks = vec![json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": section_text},
        })];
        blocks.extend(message.images.iter().map(image_block));
        blocks
    };

    PostMessage {
        channel: channel_id.to_string(),
        text,
        username: message.author.display_name.clone(),
        icon_url: message.author.avatar_url.clone(),
        blocks,
    }
}

fn image_block(image: &ImageLink) -> Value {
    json!({
        "type": "image",
        "image_url": image.url,
        "alt_text": image_alt_text(image),
    })
}

/// The attachment's file name, else the last path segment of its URL, else `image`.
pub fn image_alt_text(image: &ImageLink) -> String {
    match image.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => url_file_name(&image.url),
    }
}

fn url_file_name(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let without_scheme = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);

    without_scheme
        .split_once('/')
        .and_then(|(_, path)| path.rsplit('/').next())
        .filter(|segment| !segment.is_empty())
        .unwrap_or("image")
        .to_string()
}

/// Escape the three characters Slack treats as control sequences.
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
