//! Discord gateway event handling.
//!
//! Decodes gateway messages once into `DiscordEvent` and forwards them to
//! the Discord inbound queue. The first `Ready` is handed to startup through
//! a oneshot so channel binding can begin.

use serenity::async_trait;
use serenity::model::channel::{Attachment as DiscordAttachment, Message, MessageType};
use serenity::model::gateway::Ready;
use serenity::model::user::User;
use serenity::prelude::*;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::common::{Attachment, DiscordEvent, DiscordMessage, OutboundIdentity};

/// Discord event handler.
pub struct GatewayForwarder {
    /// Fired on the first `Ready`; later `Ready`s are reconnects.
    ready_tx: Mutex<Option<oneshot::Sender<(Context, Ready)>>>,
    discord_tx: mpsc::UnboundedSender<DiscordEvent>,
}

impl GatewayForwarder {
    pub fn new(
        ready_tx: oneshot::Sender<(Context, Ready)>,
        discord_tx: mpsc::UnboundedSender<DiscordEvent>,
    ) -> Self {
        Self {
            ready_tx: Mutex::new(Some(ready_tx)),
            discord_tx,
        }
    }
}

#[async_trait]
impl EventHandler for GatewayForwarder {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);
        match self.ready_tx.lock().await.take() {
            Some(tx) => {
                if tx.send((ctx, ready)).is_err() {
                    warn!("Discord startup is no longer waiting for Ready");
                }
            }
            None => debug!("Discord session re-established"),
        }
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        // DMs are never relayed
        if msg.guild_id.is_none() {
            return;
        }

        if let Err(e) = self.discord_tx.send(decode_message(&msg)) {
            debug!("Discord queue closed, dropping event: {}", e);
        }
    }
}

/// Decode a gateway message into a typed event.
///
/// Anything posted by a bot account or a webhook is `Bot`, regardless of
/// message type, so echo detection sees every webhook id.
pub fn decode_message(msg: &Message) -> DiscordEvent {
    if msg.webhook_id.is_some() || msg.author.bot {
        return DiscordEvent::Bot {
            channel_id: msg.channel_id,
            webhook_id: msg.webhook_id,
        };
    }

    if !is_chat_message(msg.kind) {
        return DiscordEvent::System {
            channel_id: msg.channel_id,
            kind: format!("{:?}", msg.kind),
        };
    }

    let nick = msg.member.as_ref().and_then(|m| m.nick.as_deref());
    DiscordEvent::Message(DiscordMessage {
        channel_id: msg.channel_id,
        author: OutboundIdentity {
            display_name: display_name(nick, msg.author.global_name.as_deref(), &msg.author.name),
            avatar_url: Some(avatar_png_url(&msg.author)),
        },
        content: msg.content.clone(),
        attachments: msg.attachments.iter().map(to_attachment).collect(),
    })
}

/// Regular messages and replies carry user text; every other type is a system notice.
pub fn is_chat_message(kind: MessageType) -> bool {
    matches!(kind, MessageType::Regular | MessageType::InlineReply)
}

/// Guild nickname, else global display name, else username.
pub fn display_name(nick: Option<&str>, global_name: Option<&str>, username: &str) -> String {
    nick.into_iter()
        .chain(global_name)
        .find(|name| !name.trim().is_empty())
        .unwrap_or(username)
        .to_string()
}

/// PNG avatar URL, or the default avatar when the user has none.
fn avatar_png_url(user: &User) -> String {
    match &user.avatar {
        Some(hash) => format!("https://cdn.discordapp.com/avatars/{}/{}.png", user.id, hash),
        None => user.default_avatar_url(),
    }
}

fn to_attachment(attachment: &DiscordAttachment) -> Attachment {
    Attachment {
        url: attachment.url.clone(),
        name: Some(attachment.filename.clone()),
        content_type: attachment.content_type.clone(),
    }
}
