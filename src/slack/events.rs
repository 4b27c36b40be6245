//! Socket Mode frame and event decoding.
//!
//! Frames arrive as JSON text over the WebSocket. `events_api` envelopes
//! carry an event callback whose `message` events are decoded once here into
//! `SlackEvent`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::error::{RelayError, RelayResult};
use crate::common::{Attachment, SlackEvent, SlackMessage};

/// Message subtypes that still carry a user-authored message.
const USER_SUBTYPES: &[&str] = &["file_share", "thread_broadcast"];

/// A frame received over the Socket Mode WebSocket.
#[derive(Debug, Clone, Deserialize)]
pub struct SocketFrame {
    /// `hello`, `disconnect`, `events_api`, `slash_commands`, `interactive`.
    #[serde(rename = "type")]
    pub frame_type: String,
    /// Present on envelopes; must be ACKed.
    #[serde(default)]
    pub envelope_id: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
    /// Disconnect reason, e.g. `refresh_requested`.
    #[serde(default)]
    pub reason: Option<String>,
}

/// ACK response sent back to Slack.
#[derive(Debug, Serialize)]
pub struct SocketAck<'a> {
    pub envelope_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct EventCallback {
    event: RawEvent,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    files: Vec<RawFile>,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    #[serde(default)]
    url_private: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    mimetype: Option<String>,
}

impl RawFile {
    fn into_attachment(self) -> Option<Attachment> {
        Some(Attachment {
            url: self.url_private?,
            name: self.name,
            content_type: self.mimetype,
        })
    }
}

/// Decode an `events_api` payload.
///
/// Returns `Ok(None)` for event types other than `message`.
pub fn decode_event(payload: Value) -> RelayResult<Option<SlackEvent>> {
    let callback: EventCallback = serde_json::from_value(payload).map_err(|e| RelayError::Malformed {
        message: format!("event callback: {}", e),
    })?;
    let event = callback.event;

    if event.event_type != "message" {
        return Ok(None);
    }

    let channel = event.channel.ok_or_else(|| RelayError::Malformed {
        message: "message event without channel".to_string(),
    })?;

    if let Some(bot_id) = event.bot_id {
        return Ok(Some(SlackEvent::Bot { channel, bot_id }));
    }

    if let Some(subtype) = event.subtype {
        if !USER_SUBTYPES.contains(&subtype.as_str()) {
            return Ok(Some(SlackEvent::System { channel, subtype }));
        }
    }

    let user = event.user.ok_or_else(|| RelayError::Malformed {
        message: "message event without user".to_string(),
    })?;

    Ok(Some(SlackEvent::Message(SlackMessage {
        channel,
        user,
        text: event.text.unwrap_or_default(),
        files: event
            .files
            .into_iter()
            .filter_map(RawFile::into_attachment)
            .collect(),
    })))
}
