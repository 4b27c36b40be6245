//! Custom emoji registry for the destination Discord guild.
//!
//! Maps emoji names to render tokens (`<:name:id>` / `<a:name:id>`). The cache
//! is populated lazily from the guild's emoji list, read from the gateway
//! cache when the guild is there and from the REST API otherwise. A guild is
//! listed at most once and never invalidated during the run, so emojis added
//! or renamed after that are not picked up until restart.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serenity::cache::Cache;
use serenity::http::Http;
use serenity::model::guild::Emoji;
use serenity::model::id::GuildId;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::common::error::RelayResult;
use crate::common::remote::bounded;

/// A guild custom emoji and the token Discord renders it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomEmoji {
    pub name: String,
    pub token: String,
}

/// Remote listing of a guild's custom emojis.
#[async_trait]
pub trait EmojiSource: Send + Sync {
    async fn fetch_emojis(&self, guild_id: GuildId) -> RelayResult<Vec<CustomEmoji>>;
}

impl From<&Emoji> for CustomEmoji {
    fn from(emoji: &Emoji) -> Self {
        Self {
            name: emoji.name.clone(),
            token: emoji.to_string(),
        }
    }
}

/// `EmojiSource` backed by the gateway cache, falling back to the REST API.
pub struct GuildEmojiSource {
    cache: Arc<Cache>,
    http: Arc<Http>,
}

impl GuildEmojiSource {
    pub fn new(cache: Arc<Cache>, http: Arc<Http>) -> Self {
        Self { cache, http }
    }
}

#[async_trait]
impl EmojiSource for GuildEmojiSource {
    async fn fetch_emojis(&self, guild_id: GuildId) -> RelayResult<Vec<CustomEmoji>> {
        // The guild ref must be released before the REST call
        let cached: Option<Vec<CustomEmoji>> = self
            .cache
            .guild(guild_id)
            .map(|guild| guild.emojis.values().map(CustomEmoji::from).collect());

        if let Some(emojis) = cached {
            debug!(guild = %guild_id, count = emojis.len(), "Emoji list read from gateway cache");
            return Ok(emojis);
        }

        let emojis = guild_id.emojis(&self.http).await?;
        Ok(emojis.iter().map(CustomEmoji::from).collect())
    }
}

/// Known emojis of one guild.
#[derive(Debug, Default)]
struct GuildEmojis {
    tokens: HashMap<String, String>,
    /// Set once the full guild list has been loaded; later misses are unregistered names.
    listed: bool,
}

/// Per-guild emoji name -> token cache.
#[derive(Debug, Default)]
pub struct EmojiCache {
    guilds: RwLock<HashMap<GuildId, GuildEmojis>>,
}

impl EmojiCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache already holding some emojis for one guild.
    ///
    /// The guild is not marked as listed, so other names still trigger a fetch.
    #[cfg(test)]
    pub fn with_emojis(guild_id: GuildId, emojis: impl IntoIterator<Item = CustomEmoji>) -> Self {
        let guild = GuildEmojis {
            tokens: emojis.into_iter().map(|e| (e.name, e.token)).collect(),
            listed: false,
        };
        Self {
            guilds: RwLock::new(HashMap::from([(guild_id, guild)])),
        }
    }

    /// Split `names` into cached tokens and names not in the cache.
    ///
    /// Nothing is reported missing for a guild whose full list is loaded.
    async fn partition(
        &self,
        guild_id: GuildId,
        names: &[String],
    ) -> (HashMap<String, String>, Vec<String>) {
        let guilds = self.guilds.read().await;
        let cached = guilds.get(&guild_id);
        let listed = cached.map(|guild| guild.listed).unwrap_or(false);

        let mut found = HashMap::new();
        let mut missing = Vec::new();
        for name in names {
            match cached.and_then(|guild| guild.tokens.get(name)) {
                Some(token) => {
                    found.insert(name.clone(), token.clone());
                }
                None if !listed => missing.push(name.clone()),
                None => {}
            }
        }
        (found, missing)
    }

    /// Store a guild's full emoji list.
    async fn insert_listing(&self, guild_id: GuildId, emojis: Vec<CustomEmoji>) {
        let mut guilds = self.guilds.write().await;
        let guild = guilds.entry(guild_id).or_default();
        for emoji in emojis {
            guild.tokens.insert(emoji.name, emoji.token);
        }
        guild.listed = true;
    }
}

/// Resolves emoji names against the cache, falling back to one remote listing.
pub struct EmojiRegistry {
    source: Arc<dyn EmojiSource>,
    cache: EmojiCache,
    /// Serializes remote refreshes so concurrent misses fetch once.
    refresh: Mutex<()>,
    timeout: Duration,
}

impl EmojiRegistry {
    pub fn new(source: Arc<dyn EmojiSource>, cache: EmojiCache, timeout: Duration) -> Self {
        Self {
            source,
            cache,
            refresh: Mutex::new(()),
            timeout,
        }
    }

    /// Look up render tokens for `names` in the given guild.
    ///
    /// Names that are not registered in the guild are absent from the result.
    /// The guild is listed remotely at most once.
    pub async fn lookup(
        &self,
        guild_id: GuildId,
        names: &[String],
    ) -> RelayResult<HashMap<String, String>> {
        let (mut found, missing) = self.cache.partition(guild_id, names).await;
        if missing.is_empty() {
            return Ok(found);
        }

        let _refresh = self.refresh.lock().await;

        // Another task may have refreshed the guild while we waited.
        let (cached, missing) = self.cache.partition(guild_id, &missing).await;
        found.extend(cached);
        if missing.is_empty() {
            return Ok(found);
        }

        debug!(guild = %guild_id, ?missing, "Emoji cache miss, fetching guild emojis");
        let fetched = bounded("emoji lookup", self.timeout, self.source.fetch_emojis(guild_id)).await?;
        self.cache.insert_listing(guild_id, fetched).await;

        let (cached, _unregistered) = self.cache.partition(guild_id, &missing).await;
        found.extend(cached);
        Ok(found)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::common::error::RelayError;

    /// In-memory emoji source that counts remote fetches.
    pub(crate) struct FakeEmojiSource {
        pub emojis: Vec<CustomEmoji>,
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    impl FakeEmojiSource {
        pub fn new(emojis: Vec<CustomEmoji>) -> Self {
            Self {
                emojis,
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Vec::new())
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmojiSource for FakeEmojiSource {
        async fn fetch_emojis(&self, _guild_id: GuildId) -> RelayResult<Vec<CustomEmoji>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RelayError::Malformed {
                    message: "emoji listing unavailable".to_string(),
                });
            }
            Ok(self.emojis.clone())
        }
    }

    pub(crate) fn emoji(name: &str, id: u64) -> CustomEmoji {
        CustomEmoji {
            name: name.to_string(),
            token: format!("<:{}:{}>", name, id),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_cache_hit_skips_remote() {
        let source = Arc::new(FakeEmojiSource::new(Vec::new()));
        let guild = GuildId::new(1);
        let registry = EmojiRegistry::new(
            source.clone(),
            EmojiCache::with_emojis(guild, vec![emoji("partyparrot", 10)]),
            Duration::from_secs(5),
        );

        let found = registry.lookup(guild, &names(&["partyparrot"])).await.unwrap();
        assert_eq!(found.get("partyparrot").map(String::as_str), Some("<:partyparrot:10>"));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_miss_fetches_once_and_populates() {
        let source = Arc::new(FakeEmojiSource::new(vec![emoji("blobwave", 11), emoji("meow", 12)]));
        let guild = GuildId::new(1);
        let registry = EmojiRegistry::new(source.clone(), EmojiCache::new(), Duration::from_secs(5));

        let found = registry.lookup(guild, &names(&["blobwave", "nope"])).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(source.calls(), 1);

        // Names fetched alongside are now cached too
        let found = registry.lookup(guild, &names(&["meow"])).await.unwrap();
        assert_eq!(found.get("meow").map(String::as_str), Some("<:meow:12>"));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_is_scoped_per_guild() {
        let source = Arc::new(FakeEmojiSource::new(Vec::new()));
        let registry = EmojiRegistry::new(
            source.clone(),
            EmojiCache::with_emojis(GuildId::new(1), vec![emoji("meow", 12)]),
            Duration::from_secs(5),
        );

        let found = registry.lookup(GuildId::new(2), &names(&["meow"])).await.unwrap();
        assert!(found.is_empty());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_unregistered_names_fetch_only_once() {
        let source = Arc::new(FakeEmojiSource::new(vec![emoji("meow", 12)]));
        let guild = GuildId::new(1);
        let registry = EmojiRegistry::new(source.clone(), EmojiCache::new(), Duration::from_secs(5));

        for _ in 0..5 {
            let found = registry.lookup(guild, &names(&["+1", "30"])).await.unwrap();
            assert!(found.is_empty());
        }
        assert_eq!(source.calls(), 1);

        let found = registry.lookup(guild, &names(&["meow", "+1"])).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_listing_is_retried_later() {
        let source = Arc::new(FakeEmojiSource::failing());
        let guild = GuildId::new(1);
        let registry = EmojiRegistry::new(source.clone(), EmojiCache::new(), Duration::from_secs(5));

        assert!(registry.lookup(guild, &names(&["meow"])).await.is_err());
        assert!(registry.lookup(guild, &names(&["meow"])).await.is_err());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_remote_failure_propagates() {
        let source = Arc::new(FakeEmojiSource::failing());
        let registry = EmojiRegistry::new(source, EmojiCache::new(), Duration::from_secs(5));

        let result = registry.lookup(GuildId::new(1), &names(&["meow"])).await;
        assert!(result.is_err());
    }
}
