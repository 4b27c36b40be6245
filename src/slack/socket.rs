//! Slack Socket Mode listener.
//!
//! Opens a WebSocket via `apps.connections.open`, ACKs every envelope as soon
//! as it arrives and pushes decoded message events onto the Slack inbound
//! queue. Reconnects with exponential backoff whenever the socket drops or
//! Slack asks for a refresh.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use futures::{Sink, SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::bridge::channels::shutdown_requested;
use crate::common::error::{RelayError, RelayResult};
use crate::common::SlackEvent;
use crate::slack::api::SlackApi;
use crate::slack::events::{decode_event, SocketAck, SocketFrame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Exponential backoff for Socket Mode reconnection.
/// 1s initial, 2min max, with jitter, unlimited retries.
fn socket_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(120))
        .with_jitter()
        .without_max_times()
}

/// How a single WebSocket session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Reconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameOutcome {
    Continue,
    Disconnect,
}

pub struct SocketModeClient {
    api: Arc<SlackApi>,
    events_tx: mpsc::UnboundedSender<SlackEvent>,
}

impl SocketModeClient {
    pub fn new(api: Arc<SlackApi>, events_tx: mpsc::UnboundedSender<SlackEvent>) -> Self {
        Self { api, events_tx }
    }

    async fn connect(&self) -> RelayResult<WsStream> {
        let url = self.api.apps_connections_open().await?;
        let (stream, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        Ok(stream)
    }

    /// Run until shutdown is signalled.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            let connected = tokio::select! {
                result = (|| self.connect())
                    .retry(socket_backoff())
                    .notify(|e: &RelayError, delay: Duration| {
                        warn!("Slack Socket Mode connect failed: {}. Retrying in {:.1}s...", e, delay.as_secs_f64());
                    }) => result,
                _ = shutdown_requested(&mut shutdown_rx) => {
                    info!("Shutdown signal received during Slack reconnect");
                    return;
                }
            };

            let stream = match connected {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Giving up on Slack Socket Mode: {}", e);
                    return;
                }
            };
            info!("Connected to Slack Socket Mode");

            match self.session(stream, &mut shutdown_rx).await {
                SessionEnd::Shutdown => {
                    info!("Slack Socket Mode stopped");
                    return;
                }
                SessionEnd::Reconnect => info!("Reconnecting to Slack Socket Mode..."),
            }
        }
    }

    async fn session(&self, stream: WsStream, shutdown_rx: &mut watch::Receiver<bool>) -> SessionEnd {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if self.handle_frame(&text, &mut write).await == FrameOutcome::Disconnect {
                            return SessionEnd::Reconnect;
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        if let Err(e) = write.send(WsMessage::Pong(data)).await {
                            warn!(error = %e, "Failed to answer Slack ping");
                            return SessionEnd::Reconnect;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        info!("Slack WebSocket closed by server");
                        return SessionEnd::Reconnect;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Slack WebSocket error");
                        return SessionEnd::Reconnect;
                    }
                    None => {
                        info!("Slack WebSocket stream ended");
                        return SessionEnd::Reconnect;
                    }
                },
                _ = shutdown_requested(shutdown_rx) => {
                    if let Err(e) = write.close().await {
                        debug!(error = %e, "Slack WebSocket close failed");
                    }
                    return SessionEnd::Shutdown;
                }
            }
        }
    }

    /// ACK the frame if it is an envelope, then dispatch it.
    async fn handle_frame<S>(&self, text: &str, write: &mut S) -> FrameOutcome
    where
        S: Sink<WsMessage> + Unpin,
        S::Error: Display,
    {
        let frame: SocketFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Skipping undecodable Socket Mode frame");
                return FrameOutcome::Continue;
            }
        };

        if let Some(envelope_id) = frame.envelope_id.as_deref() {
            match serde_json::to_string(&SocketAck { envelope_id }) {
                Ok(ack) => {
                    if let Err(e) = write.send(WsMessage::Text(ack.into())).await {
                        warn!(error = %e, "Failed to ACK Socket Mode envelope");
                    }
                }
                Err(e) => warn!(error = %e, "Failed to encode Socket Mode ACK"),
            }
        }

        match frame.frame_type.as_str() {
            "hello" => debug!("Received Socket Mode hello"),
            "disconnect" => {
                info!(reason = frame.reason.as_deref().unwrap_or("unknown"), "Slack requested disconnect");
                return FrameOutcome::Disconnect;
            }
            "events_api" => {
                if let Some(payload) = frame.payload {
                    self.dispatch(payload);
                }
            }
            other => debug!(frame_type = %other, "Ignoring Socket Mode frame"),
        }

        FrameOutcome::Continue
    }

    fn dispatch(&self, payload: Value) {
        match decode_event(payload) {
            Ok(Some(event)) => {
                if self.events_tx.send(event).is_err() {
                    debug!("Slack queue closed, dropping event");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Skipping malformed Slack event"),
        }
    }
}
