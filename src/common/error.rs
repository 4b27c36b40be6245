//! Error types for the application.

use serenity::http::HttpError;
use thiserror::Error;

/// Configuration-related errors.
///
/// Every variant is fatal at startup: the bridge never begins relaying.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },

    #[error("Discord channel {channel_id} is not a text channel, unable to continue")]
    NotMessageCapable { channel_id: u64 },

    #[error("Slack channel '{name}' was not found or the bot cannot see it")]
    SlackChannelNotFound { name: String },

    #[error("Unable to obtain a webhook for channel {channel_id}: {message}")]
    Webhook { channel_id: u64, message: String },

    #[error("Startup failed: {0}")]
    Startup(#[from] RelayError),
}

/// Errors from a single relay attempt.
///
/// These are never fatal; the affected message is dropped and logged.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: &'static str, seconds: u64 },

    #[error("Slack API {method} failed: {error}")]
    SlackApi { method: &'static str, error: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Discord error: {0}")]
    Discord(#[from] serenity::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Malformed payload: {message}")]
    Malformed { message: String },
}

/// Slack API error codes that may clear up on their own.
const TRANSIENT_SLACK_ERRORS: &[&str] = &[
    "ratelimited",
    "internal_error",
    "fatal_error",
    "request_timeout",
    "service_unavailable",
];

/// Rate limiting and server-side failures; other HTTP statuses are permanent.
fn is_transient_status(status: u16) -> bool {
    status == 429 || status >= 500
}

impl RelayError {
    /// Whether sending again could succeed.
    ///
    /// Timeouts, connection failures, rate limits and server errors are
    /// retried. Rejected requests, bad credentials, unknown channels and
    /// malformed payloads are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::Timeout { .. } | RelayError::WebSocket(_) => true,
            RelayError::SlackApi { error, .. } => TRANSIENT_SLACK_ERRORS.contains(&error.as_str()),
            RelayError::Http(e) => e
                .status()
                .map(|status| is_transient_status(status.as_u16()))
                .unwrap_or(true),
            RelayError::Discord(serenity::Error::Http(HttpError::UnsuccessfulRequest(response))) => {
                is_transient_status(response.status_code.as_u16())
            }
            RelayError::Discord(_) => false,
            RelayError::Malformed { .. } => false,
        }
    }
}

/// Result type alias for relay operations.
pub type RelayResult<T> = std::result::Result<T, RelayError>;
