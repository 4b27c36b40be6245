//! Switchboard - Slack-Discord channel bridge
//!
//! Relays messages between one Slack channel and one Discord channel,
//! posting each one under the original author's name and avatar.

mod bridge;
mod common;
mod config;
mod discord;
mod slack;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::{debug, error, info, warn};

use bridge::{
    bind_channels, BoundChannels, ChannelBundle, EventFilter, MessageFilter, RelayPipeline, RelayRouter,
    RelaySettings,
};
use config::env::{check_empty_env_vars, get_config_path};
use config::load_and_validate;
use discord::{EmojiCache, EmojiRegistry, GuildEmojiSource, MessageResolver, WebhookSender};
use slack::{IdentityResolver, ProfileCache, SlackApi, SlackSender, SocketModeClient};

/// How long to wait for the first Discord `Ready`.
const DISCORD_READY_TIMEOUT: Duration = Duration::from_secs(15);

/// How long background tasks get to stop after shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Switchboard v{} starting...", env!("CARGO_PKG_VERSION"));

    for var in check_empty_env_vars() {
        warn!("{} is set but empty", var);
    }

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Slack channel: {}", config.slack.channel);
    info!("  Discord channel: {}", config.discord.channel_id);

    let settings = RelaySettings::from_config(&config.relay);
    let content_filter = MessageFilter::from_config(config.filters.as_ref());
    if content_filter.has_patterns() {
        info!("Content filters enabled");
    }

    let channels = ChannelBundle::new();

    // ============================================================
    // Discord: connect and announce presence
    // ============================================================
    info!("Connecting to Discord...");
    let mut gateway = discord::client::connect(
        &config.discord.token,
        channels.ingress.discord_tx.clone(),
        DISCORD_READY_TIMEOUT,
    )
    .await
    .map_err(|e| {
        error!("Failed to connect to Discord: {}", e);
        e
    })?;
    gateway.set_activity(&config.discord.presence);

    // ============================================================
    // Bind both channels (Discord first, then Slack)
    // ============================================================
    let slack_api = Arc::new(SlackApi::new(
        config.slack.bot_token.clone(),
        config.slack.app_token.clone(),
    ));

    let BoundChannels {
        binding,
        origin,
        webhook,
    } = bind_channels(&gateway.http, gateway.ready.user.id, &slack_api, &config)
        .await
        .map_err(|e| {
            error!("{}", e);
            e
        })?;
    let slack_channel_id = binding.slack_channel_id.clone();

    // ============================================================
    // Relay pipeline
    // ============================================================
    let emojis = EmojiRegistry::new(
        Arc::new(GuildEmojiSource::new(
            gateway.context.cache.clone(),
            gateway.http.clone(),
        )),
        EmojiCache::new(),
        settings.remote_timeout,
    );
    let identities = IdentityResolver::new(slack_api.clone(), ProfileCache::new(), settings.remote_timeout);
    let to_discord = Arc::new(WebhookSender::new(gateway.http.clone(), webhook, settings.remote_timeout));
    let to_slack = Arc::new(SlackSender::new(slack_api.clone(), slack_channel_id, settings.remote_timeout));

    let router = RelayRouter::new(RelayPipeline::new(
        EventFilter::new(binding, origin),
        content_filter,
        MessageResolver::new(emojis),
        identities,
        to_discord,
        to_slack,
        settings,
    ));

    // ============================================================
    // Run
    // ============================================================
    let shutdown_tx = channels.control.shutdown_tx;
    let shutdown_rx = channels.control.shutdown_rx;

    let socket_task = tokio::spawn(
        SocketModeClient::new(slack_api, channels.ingress.slack_tx).run(shutdown_rx.clone()),
    );
    let router_task = tokio::spawn(router.run(channels.queues, shutdown_rx));

    info!("Relay running");

    tokio::select! {
        _ = shutdown_signal() => info!("Shutdown signal received - stopping relay..."),
        _ = gateway.stopped() => error!("Discord gateway stopped unexpectedly"),
    }

    if let Err(e) = shutdown_tx.send(true) {
        debug!("Shutdown channel closed (tasks already exited): {}", e);
    }

    for (name, task) in [("Slack Socket Mode", socket_task), ("Relay router", router_task)] {
        match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
            Ok(Ok(())) => debug!("{} task stopped", name),
            Ok(Err(e)) => warn!("{} task panicked: {}", name, e),
            Err(_) => warn!("{} task did not stop in time", name),
        }
    }

    gateway.shutdown().await;

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
