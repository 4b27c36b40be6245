//! Relay core shared by both platforms.
//!
//! ## Module Structure
//!
//! - `channels`: Inbound queues and the shutdown signal
//! - `filter`: Event classification and content filters
//! - `formatter`: Display name formatting
//! - `router`: Relay router and per-message pipeline
//! - `sender`: Outbound sender seam
//! - `startup`: Channel binding at startup
//! - `state`: Channel binding and relay settings

pub mod channels;
pub mod filter;
pub mod formatter;
pub mod router;
pub mod sender;
pub mod startup;
pub mod state;

pub use channels::ChannelBundle;
pub use filter::{EventFilter, MessageFilter};
pub use router::{RelayPipeline, RelayRouter};
pub use startup::{bind_channels, BoundChannels};
pub use state::RelaySettings;
