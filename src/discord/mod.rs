//! Discord integration.
//!
//! Gateway connection, webhook delivery and the text normalization shared
//! by both relay directions.

pub mod client;
pub mod emoji;
pub mod handler;
pub mod resolver;
pub mod webhook;

pub use emoji::{EmojiCache, EmojiRegistry, GuildEmojiSource};
pub use resolver::MessageResolver;
pub use webhook::WebhookSender;
