//! Canonical message types for bridge communication.
//!
//! Platform payloads are decoded once at the boundary (`slack::events`,
//! `discord::handler`) into these types, so the relay pipeline never has to
//! re-check optional fields.

use std::fmt;

use serenity::model::id::{ChannelId, WebhookId};

/// One side of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Slack,
    Discord,
}

impl Platform {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Slack => "Slack",
            Self::Discord => "Discord",
        }
    }

    /// The platform a message from `self` is relayed to.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Slack => Self::Discord,
            Self::Discord => Self::Slack,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Display identity a relayed message is posted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundIdentity {
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Payload handed to an outbound sender. Built once per accepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    /// Platform the message was originally posted on.
    pub source: Platform,
    /// Author identity, already formatted for the destination.
    pub author: OutboundIdentity,
    /// Normalized text, never empty.
    pub text: String,
    /// Image attachments in their original order.
    pub images: Vec<ImageLink>,
}

/// An image carried over from an inbound attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLink {
    pub url: String,
    /// Original file name, when the platform provided one.
    pub name: Option<String>,
}

/// A file attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub url: String,
    pub name: Option<String>,
    /// Declared MIME type, when the platform provides one.
    pub content_type: Option<String>,
}

impl Attachment {
    /// Whether the declared content type marks this as an image.
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|t| t.contains("image"))
            .unwrap_or(false)
    }
}

/// A regular user message posted in Slack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackMessage {
    pub channel: String,
    pub user: String,
    /// Raw Slack mrkdwn text. Empty when the event carried none.
    pub text: String,
    pub files: Vec<Attachment>,
}

/// Inbound Slack event, decoded from a Socket Mode envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlackEvent {
    /// Message written by a human.
    Message(SlackMessage),
    /// Channel joins, edits, deletions and other subtyped messages.
    System { channel: String, subtype: String },
    /// Message posted by an app or bot, including the bridge itself.
    Bot { channel: String, bot_id: String },
}

impl SlackEvent {
    pub fn channel(&self) -> &str {
        match self {
            Self::Message(m) => &m.channel,
            Self::System { channel, .. } | Self::Bot { channel, .. } => channel,
        }
    }
}

/// A regular user message posted in Discord.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordMessage {
    pub channel_id: ChannelId,
    /// Nickname (or display name) and PNG avatar of the author.
    pub author: OutboundIdentity,
    /// Raw message content including mention markup.
    pub content: String,
    pub attachments: Vec<Attachment>,
}

/// Inbound Discord event, decoded from a gateway `MESSAGE_CREATE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscordEvent {
    /// Message written by a human.
    Message(DiscordMessage),
    /// Pins, joins, boosts and other non-chat message types.
    System { channel_id: ChannelId, kind: String },
    /// Message from a bot account or any webhook, including the bridge's own.
    Bot {
        channel_id: ChannelId,
        webhook_id: Option<WebhookId>,
    },
}

impl DiscordEvent {
    pub fn channel_id(&self) -> ChannelId {
        match self {
            Self::Message(m) => m.channel_id,
            Self::System { channel_id, .. } | Self::Bot { channel_id, .. } => *channel_id,
        }
    }
}

/// Any inbound event the router can receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Slack(SlackEvent),
    Discord(DiscordEvent),
}

impl InboundEvent {
    pub fn platform(&self) -> Platform {
        match self {
            Self::Slack(_) => Platform::Slack,
            Self::Discord(_) => Platform::Discord,
        }
    }
}
