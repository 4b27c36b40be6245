//! Common utilities and types shared across the application.

pub mod error;
pub mod messages;
pub mod remote;

pub use messages::{
    Attachment, DiscordEvent, DiscordMessage, ImageLink, InboundEvent, NormalizedMessage, OutboundIdentity,
    Platform, SlackEvent, SlackMessage,
};
