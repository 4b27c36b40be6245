//! Relay router.
//!
//! A single task consumes both inbound queues, applies `EventFilter`
//! synchronously and spawns one relay task per accepted event. Each relay
//! normalizes the text, resolves the author, and hands exactly one
//! `NormalizedMessage` to the opposite platform's sender. Failures drop the
//! one message and are logged; nothing propagates back to the router.

use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bridge::channels::{shutdown_requested, InboundQueues};
use crate::bridge::filter::{Accepted, EventFilter, FilterDirection, MessageFilter};
use crate::bridge::formatter::{FormatContext, NameFormatter};
use crate::bridge::sender::OutboundSender;
use crate::bridge::state::RelaySettings;
use crate::common::error::{RelayError, RelayResult};
use crate::common::{
    DiscordMessage, InboundEvent, NormalizedMessage, OutboundIdentity, Platform, SlackMessage,
};
use crate::discord::resolver::{image_links, MessageResolver, SourceContext};
use crate::slack::profile::IdentityResolver;

/// Send once, then retry up to `retries` more times with exponential backoff.
pub async fn send_with_retry(
    sender: &dyn OutboundSender,
    message: &NormalizedMessage,
    retries: usize,
) -> RelayResult<()> {
    if retries == 0 {
        return sender.send(message).await;
    }

    let backoff = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(10))
        .with_jitter()
        .with_max_times(retries);

    (|| sender.send(message))
        .retry(backoff)
        .when(RelayError::is_retryable)
        .notify(|e: &RelayError, delay: Duration| {
            warn!("{} send failed: {}. Retrying in {:.1}s...", message.source.opposite(), e, delay.as_secs_f64());
        })
        .await
}

/// Everything a relay task needs, shared by all of them.
pub struct RelayPipeline {
    filter: EventFilter,
    content_filter: MessageFilter,
    resolver: MessageResolver,
    identities: IdentityResolver,
    to_discord: Arc<dyn OutboundSender>,
    to_slack: Arc<dyn OutboundSender>,
    settings: RelaySettings,
    slack_names: NameFormatter,
    discord_names: NameFormatter,
}

impl RelayPipeline {
    pub fn new(
        filter: EventFilter,
        content_filter: MessageFilter,
        resolver: MessageResolver,
        identities: IdentityResolver,
        to_discord: Arc<dyn OutboundSender>,
        to_slack: Arc<dyn OutboundSender>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            slack_names: NameFormatter::new(settings.slack_name_format.clone()),
            discord_names: NameFormatter::new(settings.discord_name_format.clone()),
            filter,
            content_filter,
            resolver,
            identities,
            to_discord,
            to_slack,
            settings,
        }
    }

    /// Relay one accepted event, logging instead of returning failures.
    pub async fn relay(&self, accepted: Accepted) {
        let (source, result) = match accepted {
            Accepted::FromSlack(message) => (Platform::Slack, self.relay_from_slack(message).await),
            Accepted::FromDiscord(message) => {
                (Platform::Discord, self.relay_from_discord(message).await)
            }
        };

        if let Err(e) = result {
            warn!("Dropped {} -> {} message: {}", source, source.opposite(), e);
        }
    }

    async fn relay_from_slack(&self, message: SlackMessage) -> RelayResult<()> {
        let context = SourceContext::Slack {
            destination_guild: self.filter.binding().discord_guild_id,
        };

        let (text, author) = tokio::join!(
            self.resolver.normalize(&message.text, &context),
            self.identities.resolve(&message.user),
        );
        let (text, author) = (text?, author?);

        let outbound = NormalizedMessage {
            source: Platform::Slack,
            author: self.format_author(&self.slack_names, author, Platform::Slack),
            text: self.or_placeholder(text),
            images: image_links(&message.files),
        };
        self.deliver(FilterDirection::SlackToDiscord, self.to_discord.as_ref(), outbound)
            .await
    }

    async fn relay_from_discord(&self, message: DiscordMessage) -> RelayResult<()> {
        let text = self
            .resolver
            .normalize(&message.content, &SourceContext::Discord)
            .await?;

        let outbound = NormalizedMessage {
            source: Platform::Discord,
            author: self.format_author(&self.discord_names, message.author, Platform::Discord),
            text: self.or_placeholder(text),
            images: image_links(&message.attachments),
        };
        self.deliver(FilterDirection::DiscordToSlack, self.to_slack.as_ref(), outbound)
            .await
    }

    fn format_author(
        &self,
        formatter: &NameFormatter,
        author: OutboundIdentity,
        platform: Platform,
    ) -> OutboundIdentity {
        OutboundIdentity {
            display_name: formatter.format(&FormatContext::new(author.display_name, platform)),
            avatar_url: author.avatar_url,
        }
    }

    fn or_placeholder(&self, text: String) -> String {
        if text.trim().is_empty() {
            self.settings.placeholder.clone()
        } else {
            text
        }
    }

    async fn deliver(
        &self,
        direction: FilterDirection,
        sender: &dyn OutboundSender,
        message: NormalizedMessage,
    ) -> RelayResult<()> {
        let route = format!("{} -> {}", message.source, message.source.opposite());

        if self.content_filter.should_filter(direction, &message.text) {
            debug!("FILTERED {}: {}", route, message.text);
            return Ok(());
        }

        send_with_retry(sender, &message, self.settings.send_retries).await?;
        info!("{}: [{}] {}", route, message.author.display_name, message.text);
        Ok(())
    }
}

/// Consumes both inbound queues and fans accepted events out to relay tasks.
pub struct RelayRouter {
    pipeline: Arc<RelayPipeline>,
}

impl RelayRouter {
    pub fn new(pipeline: RelayPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Filter an event and spawn its relay task if it is accepted.
    pub fn on_inbound_event(&self, event: InboundEvent) -> Option<JoinHandle<()>> {
        let platform = event.platform();
        match self.pipeline.filter.classify(event) {
            Ok(accepted) => {
                let pipeline = self.pipeline.clone();
                Some(tokio::spawn(async move { pipeline.relay(accepted).await }))
            }
            Err(reason) => {
                debug!(?reason, "Dropped {} event", platform);
                None
            }
        }
    }

    /// Run until shutdown is signalled or both queues are closed.
    pub async fn run(self, queues: InboundQueues, mut shutdown_rx: watch::Receiver<bool>) {
        let InboundQueues {
            mut slack_rx,
            mut discord_rx,
        } = queues;
        let mut slack_open = true;
        let mut discord_open = true;

        while slack_open || discord_open {
            tokio::select! {
                event = slack_rx.recv(), if slack_open => match event {
                    Some(event) => {
                        self.on_inbound_event(InboundEvent::Slack(event));
                    }
                    None => {
                        warn!("Slack event queue closed");
                        slack_open = false;
                    }
                },
                event = discord_rx.recv(), if discord_open => match event {
                    Some(event) => {
                        self.on_inbound_event(InboundEvent::Discord(event));
                    }
                    None => {
                        warn!("Discord event queue closed");
                        discord_open = false;
                    }
                },
                _ = shutdown_requested(&mut shutdown_rx) => {
                    info!("Shutdown signal received, stopping relay router");
                    break;
                }
            }
        }
        info!("Relay router ended");
    }
}
