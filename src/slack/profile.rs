//! Slack user identity resolution.
//!
//! Maps a Slack user id to the display name and avatar a relayed message is
//! posted under on Discord. Profiles are fetched at most once per user for
//! the lifetime of the process; concurrent lookups for the same user share a
//! single in-flight request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::common::error::{RelayError, RelayResult};
use crate::common::remote::bounded;
use crate::common::OutboundIdentity;
use crate::slack::api::{SlackApi, UserProfile};

/// Remote profile lookup.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self, user_id: &str) -> RelayResult<UserProfile>;
}

#[async_trait]
impl ProfileSource for SlackApi {
    async fn fetch_profile(&self, user_id: &str) -> RelayResult<UserProfile> {
        self.users_profile_get(user_id).await
    }
}

/// A resolved identity and when it was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedProfile {
    pub identity: OutboundIdentity,
    pub fetched_at: DateTime<Utc>,
}

impl CachedProfile {
    /// Display name falls back from the display name to the real name to the id.
    pub fn from_profile(user_id: &str, profile: &UserProfile) -> Self {
        let display_name = [&profile.display_name_normalized, &profile.real_name_normalized]
            .into_iter()
            .map(|name| name.trim())
            .find(|name| !name.is_empty())
            .unwrap_or(user_id)
            .to_string();

        Self {
            identity: OutboundIdentity {
                display_name,
                avatar_url: profile.image_192.clone().filter(|url| !url.is_empty()),
            },
            fetched_at: Utc::now(),
        }
    }
}

/// Per-user profile slots. A slot is created on first lookup and filled once.
#[derive(Debug, Default)]
pub struct ProfileCache {
    slots: Mutex<HashMap<String, Arc<OnceCell<CachedProfile>>>>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache pre-populated with known identities.
    #[cfg(test)]
    pub fn with_profiles(profiles: impl IntoIterator<Item = (String, OutboundIdentity)>) -> Self {
        let slots = profiles
            .into_iter()
            .map(|(user_id, identity)| {
                let cached = CachedProfile {
                    identity,
                    fetched_at: Utc::now(),
                };
                (user_id, Arc::new(OnceCell::new_with(Some(cached))))
            })
            .collect();
        Self {
            slots: Mutex::new(slots),
        }
    }

    async fn slot(&self, user_id: &str) -> Arc<OnceCell<CachedProfile>> {
        let mut slots = self.slots.lock().await;
        slots.entry(user_id.to_string()).or_default().clone()
    }

    /// The cached profile for a user, if one has been fetched.
    #[cfg(test)]
    pub async fn get(&self, user_id: &str) -> Option<CachedProfile> {
        let slots = self.slots.lock().await;
        slots.get(user_id).and_then(|slot| slot.get().cloned())
    }
}

pub struct IdentityResolver {
    source: Arc<dyn ProfileSource>,
    cache: ProfileCache,
    timeout: Duration,
}

impl IdentityResolver {
    pub fn new(source: Arc<dyn ProfileSource>, cache: ProfileCache, timeout: Duration) -> Self {
        Self {
            source,
            cache,
            timeout,
        }
    }

    /// Resolve a Slack user id to its outbound identity.
    ///
    /// A failed fetch leaves the slot empty so the next event retries.
    pub async fn resolve(&self, user_id: &str) -> RelayResult<OutboundIdentity> {
        let slot = self.cache.slot(user_id).await;
        let profile = slot
            .get_or_try_init(|| async {
                let profile =
                    bounded("profile fetch", self.timeout, self.source.fetch_profile(user_id)).await?;
                let cached = CachedProfile::from_profile(user_id, &profile);
                debug!(
                    user = %user_id,
                    name = %cached.identity.display_name,
                    fetched_at = %cached.fetched_at,
                    "Cached Slack profile"
                );
                Ok::<_, RelayError>(cached)
            })
            .await?;

        Ok(profile.identity.clone())
    }

    #[cfg(test)]
    pub fn cache(&self) -> &ProfileCache {
        &self.cache
    }
}
