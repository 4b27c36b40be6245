//! Outbound sender seam.
//!
//! One implementation per destination platform: `discord::webhook::WebhookSender`
//! and `slack::sender::SlackSender`.

use async_trait::async_trait;

use crate::common::error::RelayResult;
use crate::common::NormalizedMessage;

/// Performs the platform-specific send of a normalized message under the
/// original author's identity.
#[async_trait]
pub trait OutboundSender: Send + Sync {
    async fn send(&self, message: &NormalizedMessage) -> RelayResult<()>;
}
