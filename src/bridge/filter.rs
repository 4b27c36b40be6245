//! Inbound event filtering.
//!
//! Two layers:
//! - `EventFilter` decides whether an inbound event is relayed at all
//!   (channel binding, echo suppression, bots, system messages).
//! - `MessageFilter` drops normalized messages matching configured regex
//!   patterns before they are sent.

use fancy_regex::Regex;
use tracing::warn;

use crate::bridge::state::{ChannelBinding, RelayOrigin};
use crate::common::{DiscordEvent, DiscordMessage, InboundEvent, SlackEvent, SlackMessage};
use crate::config::types::FiltersConfig;

/// Why an inbound event was not relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Posted in a channel other than the bound one.
    UnboundChannel,
    /// Produced by the bridge's own relay.
    Echo,
    /// Authored by some other bot or webhook.
    Bot,
    /// Not a regular chat message.
    System(String),
}

/// An event that passed `EventFilter`, tagged with its relay direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accepted {
    /// Slack -> Discord.
    FromSlack(SlackMessage),
    /// Discord -> Slack.
    FromDiscord(DiscordMessage),
}

/// Applies the relay policy to every inbound event, in order:
/// bound channel, echo, bot, system.
#[derive(Debug, Clone)]
pub struct EventFilter {
    binding: ChannelBinding,
    origin: RelayOrigin,
}

impl EventFilter {
    pub fn new(binding: ChannelBinding, origin: RelayOrigin) -> Self {
        Self { binding, origin }
    }

    pub fn binding(&self) -> &ChannelBinding {
        &self.binding
    }

    /// Classify an event, consuming it.
    pub fn classify(&self, event: InboundEvent) -> Result<Accepted, DropReason> {
        if !self.binding.is_bound(&event) {
            return Err(DropReason::UnboundChannel);
        }
        if self.origin.is_echo(&event) {
            return Err(DropReason::Echo);
        }

        match event {
            InboundEvent::Slack(SlackEvent::Message(message)) => Ok(Accepted::FromSlack(message)),
            InboundEvent::Discord(DiscordEvent::Message(message)) => {
                Ok(Accepted::FromDiscord(message))
            }
            InboundEvent::Slack(SlackEvent::Bot { .. })
            | InboundEvent::Discord(DiscordEvent::Bot { .. }) => Err(DropReason::Bot),
            InboundEvent::Slack(SlackEvent::System { subtype, .. }) => {
                Err(DropReason::System(subtype))
            }
            InboundEvent::Discord(DiscordEvent::System { kind, .. }) => {
                Err(DropReason::System(kind))
            }
        }
    }
}

/// Direction of message flow for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDirection {
    /// Slack to Discord.
    SlackToDiscord,
    /// Discord to Slack.
    DiscordToSlack,
}

/// Message filter that checks normalized text against regex patterns.
#[derive(Debug, Clone)]
pub struct MessageFilter {
    slack_to_discord_patterns: Vec<CompiledPattern>,
    discord_to_slack_patterns: Vec<CompiledPattern>,
}

/// A compiled regex pattern with its original string for debugging.
#[derive(Debug, Clone)]
struct CompiledPattern {
    original: String,
    regex: Regex,
}

impl MessageFilter {
    /// Create a new message filter from pattern strings.
    ///
    /// Invalid regex patterns are logged and skipped.
    pub fn new(slack_to_discord: Option<Vec<String>>, discord_to_slack: Option<Vec<String>>) -> Self {
        Self {
            slack_to_discord_patterns: compile_patterns(slack_to_discord.unwrap_or_default()),
            discord_to_slack_patterns: compile_patterns(discord_to_slack.unwrap_or_default()),
        }
    }

    /// Create an empty filter that allows all messages.
    pub fn empty() -> Self {
        Self {
            slack_to_discord_patterns: Vec::new(),
            discord_to_slack_patterns: Vec::new(),
        }
    }

    /// Build the filter from optional config; disabled filters allow everything.
    pub fn from_config(filters: Option<&FiltersConfig>) -> Self {
        match filters {
            Some(f) if f.enabled => {
                Self::new(f.slack_to_discord.clone(), f.discord_to_slack.clone())
            }
            _ => Self::empty(),
        }
    }

    /// Check if a message should be filtered (blocked) for the given direction.
    ///
    /// Returns `true` if the message matches any filter pattern and should be blocked.
    pub fn should_filter(&self, direction: FilterDirection, message: &str) -> bool {
        let patterns = match direction {
            FilterDirection::SlackToDiscord => &self.slack_to_discord_patterns,
            FilterDirection::DiscordToSlack => &self.discord_to_slack_patterns,
        };

        patterns.iter().any(|p| {
            p.regex.is_match(message).unwrap_or_else(|e| {
                warn!("Regex match error for pattern '{}': {}", p.original, e);
                false
            })
        })
    }

    /// Returns true if the filter has any patterns configured.
    pub fn has_patterns(&self) -> bool {
        !self.slack_to_discord_patterns.is_empty() || !self.discord_to_slack_patterns.is_empty()
    }
}

/// Compile a list of regex pattern strings, skipping invalid ones.
fn compile_patterns(patterns: Vec<String>) -> Vec<CompiledPattern> {
    patterns
        .into_iter()
        .filter_map(|pattern| match Regex::new(&pattern) {
            Ok(regex) => Some(CompiledPattern {
                original: pattern,
                regex,
            }),
            Err(e) => {
                warn!("Invalid filter regex pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}
