//! Slack integration over the Web API and Socket Mode.

pub mod api;
pub mod events;
pub mod profile;
pub mod sender;
pub mod socket;

pub use api::SlackApi;
pub use profile::{IdentityResolver, ProfileCache};
pub use sender::SlackSender;
pub use socket::SocketModeClient;
