//! Bridge channel management.
//!
//! Provides communication channel structures for the bridge, grouping the
//! per-platform inbound queues and the shutdown signal.

use tokio::sync::{mpsc, watch};

use crate::common::{DiscordEvent, SlackEvent};

/// Producer halves handed to the platform listeners.
#[derive(Clone)]
pub struct IngressSenders {
    /// Sender for decoded Socket Mode events.
    pub slack_tx: mpsc::UnboundedSender<SlackEvent>,
    /// Sender for decoded gateway messages.
    pub discord_tx: mpsc::UnboundedSender<DiscordEvent>,
}

/// Consumer halves owned by the router task.
pub struct InboundQueues {
    pub slack_rx: mpsc::UnboundedReceiver<SlackEvent>,
    pub discord_rx: mpsc::UnboundedReceiver<DiscordEvent>,
}

/// Control channels for shutdown coordination.
pub struct ControlChannels {
    /// Sender to trigger shutdown.
    pub shutdown_tx: watch::Sender<bool>,
    /// Receiver template; clone one per long-running task.
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Bundle of all channels created by the bridge.
pub struct ChannelBundle {
    pub ingress: IngressSenders,
    pub queues: InboundQueues,
    pub control: ControlChannels,
}

impl ChannelBundle {
    /// Create a new set of bridge channels.
    pub fn new() -> Self {
        let (slack_tx, slack_rx) = mpsc::unbounded_channel();
        let (discord_tx, discord_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            ingress: IngressSenders {
                slack_tx,
                discord_tx,
            },
            queues: InboundQueues {
                slack_rx,
                discord_rx,
            },
            control: ControlChannels {
                shutdown_tx,
                shutdown_rx,
            },
        }
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve once shutdown has been signalled or the sender is gone.
pub async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|&stop| stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_requested_waits_for_true() {
        let ChannelBundle { control, .. } = ChannelBundle::new();
        let mut rx = control.shutdown_rx.clone();

        let pending = tokio::time::timeout(Duration::from_millis(20), shutdown_requested(&mut rx)).await;
        assert!(pending.is_err());

        control.shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), shutdown_requested(&mut rx))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ingress_reaches_queues() {
        let ChannelBundle {
            ingress, mut queues, ..
        } = ChannelBundle::new();

        ingress
            .slack_tx
            .send(SlackEvent::Bot {
                channel: "C1".to_string(),
                bot_id: "B1".to_string(),
            })
            .unwrap();

        assert_eq!(queues.slack_rx.recv().await.map(|e| e.channel().to_string()), Some("C1".to_string()));
    }
}
