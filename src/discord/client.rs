//! Discord bot client abstraction.
//!
//! Provides a high-level interface for connecting the gateway and managing
//! presence, hiding serenity implementation details from the rest of the
//! application.

use std::sync::Arc;
use std::time::Duration;

use serenity::gateway::{ActivityData, ShardManager};
use serenity::http::Http;
use serenity::model::gateway::Ready;
use serenity::model::user::OnlineStatus;
use serenity::prelude::*;
use serenity::Client;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::common::error::{RelayError, RelayResult};
use crate::common::DiscordEvent;
use crate::discord::handler::GatewayForwarder;

/// A connected gateway session.
pub struct DiscordGateway {
    pub http: Arc<Http>,
    /// Context from the first `Ready`; used for presence updates.
    pub context: Context,
    pub ready: Ready,
    shard_manager: Arc<ShardManager>,
    /// Gateway task; taken once it has been awaited.
    task: Option<JoinHandle<()>>,
}

fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
}

/// Connect to the gateway and wait for the first `Ready`.
///
/// Fails if the client cannot be built, the gateway task ends first, or
/// `Ready` does not arrive within `ready_timeout`.
pub async fn connect(
    token: &str,
    discord_tx: mpsc::UnboundedSender<DiscordEvent>,
    ready_timeout: Duration,
) -> RelayResult<DiscordGateway> {
    let (ready_tx, ready_rx) = oneshot::channel::<(Context, Ready)>();
    let forwarder = GatewayForwarder::new(ready_tx, discord_tx);

    let mut client = Client::builder(token, intents())
        .event_handler(forwarder)
        .await?;

    let http = client.http.clone();
    let shard_manager = client.shard_manager.clone();

    let task = tokio::spawn(async move {
        // serenity handles gateway reconnects internally
        match client.start().await {
            Ok(()) => info!("Discord client disconnected normally"),
            Err(e) => error!("Discord client error: {}", e),
        }
    });

    info!("Waiting for Discord to connect...");
    let (context, ready) = match tokio::time::timeout(ready_timeout, ready_rx).await {
        Ok(Ok(pair)) => pair,
        Ok(Err(_)) => {
            shard_manager.shutdown_all().await;
            return Err(RelayError::Malformed {
                message: "Discord client stopped before Ready".to_string(),
            });
        }
        Err(_) => {
            shard_manager.shutdown_all().await;
            return Err(RelayError::Timeout {
                operation: "Discord Ready",
                seconds: ready_timeout.as_secs(),
            });
        }
    };

    Ok(DiscordGateway {
        http,
        context,
        ready,
        shard_manager,
        task: Some(task),
    })
}

impl DiscordGateway {
    /// Show the bridge activity text.
    pub fn set_activity(&self, text: &str) {
        self.context.set_activity(Some(ActivityData::playing(text)));
    }

    /// Go invisible and close all shards.
    pub async fn shutdown(self) {
        self.context.set_presence(None, OnlineStatus::Invisible);
        // Let the presence update reach the gateway before the shards close
        tokio::time::sleep(Duration::from_millis(500)).await;

        info!("Initiating graceful Discord shutdown...");
        self.shard_manager.shutdown_all().await;
        if let Some(task) = self.task {
            if let Err(e) = task.await {
                error!("Discord task panicked: {}", e);
            }
        }
        info!("Discord shutdown complete");
    }

    /// Resolves when the gateway task ends on its own.
    pub async fn stopped(&mut self) {
        match self.task.as_mut() {
            Some(task) => {
                if let Err(e) = task.await {
                    error!("Discord task panicked: {}", e);
                }
                self.task = None;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
