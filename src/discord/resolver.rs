//! Emoji, mention, and link resolution.
//!
//! Handles translation between Slack mrkdwn and Discord-flavoured text:
//! custom emoji shortcodes, @mentions, channel references and wrapped links.

use std::collections::HashMap;

use fancy_regex::{Captures, Regex};
use serenity::model::id::GuildId;

use crate::common::error::RelayResult;
use crate::common::{Attachment, ImageLink};
use crate::discord::emoji::EmojiRegistry;

/// Where the text being normalized was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceContext {
    /// Slack text headed for Discord; shortcodes resolve against this guild.
    Slack { destination_guild: GuildId },
    /// Discord text headed for Slack.
    Discord,
}

/// Message resolver for Slack <-> Discord text translation.
pub struct MessageResolver {
    /// Pattern for `:name:` shortcodes.
    shortcode_pattern: Regex,
    /// Pattern for Slack user, channel and special mentions (`<@U123>`, `<#C1|general>`, `<!here>`).
    slack_mention_pattern: Regex,
    /// Pattern for Slack wrapped links (`<https://x|label>`).
    slack_link_pattern: Regex,
    /// Pattern for Discord custom emojis (<:name:id> or <a:name:id>).
    discord_emoji_pattern: Regex,
    /// Pattern for Discord user, role and channel mentions.
    discord_mention_pattern: Regex,
    emojis: EmojiRegistry,
}

impl MessageResolver {
    pub fn new(emojis: EmojiRegistry) -> Self {
        Self {
            shortcode_pattern: Regex::new(r":([A-Za-z0-9_+\-]+):").unwrap(),
            slack_mention_pattern: Regex::new(r"<[@#!][^<>]*>").unwrap(),
            slack_link_pattern: Regex::new(r"<((?:https?|mailto):[^|<>]+)(?:\|[^<>]*)?>").unwrap(),
            discord_emoji_pattern: Regex::new(r"<a?:([a-zA-Z0-9_]+):\d+>").unwrap(),
            discord_mention_pattern: Regex::new(r"<(?:@[!&]?|#)\d+>").unwrap(),
            emojis,
        }
    }

    /// Normalize raw message text for the destination platform.
    ///
    /// Slack text has its mention markup stripped and each distinct `:name:`
    /// shortcode registered in the destination guild replaced by its render
    /// token, with unresolved shortcodes left verbatim. Discord text has
    /// custom emoji tokens turned back into `:name:` and mentions stripped.
    ///
    /// Whitespace is preserved; an empty result is left to the caller.
    pub async fn normalize(&self, raw: &str, source: &SourceContext) -> RelayResult<String> {
        match source {
            SourceContext::Slack { destination_guild } => {
                let text = decode_slack_entities(&self.strip_slack_markup(raw));
                let names = self.shortcodes(&text);
                if names.is_empty() {
                    return Ok(text);
                }

                let tokens = self.emojis.lookup(*destination_guild, &names).await?;
                Ok(self.replace_shortcodes(&text, &tokens))
            }
            SourceContext::Discord => {
                let text = self.resolve_custom_emojis_to_text(raw);
                Ok(self.strip_discord_mentions(&text))
            }
        }
    }

    /// Remove Slack mention markup and unwrap `<url|label>` links to the bare URL.
    pub fn strip_slack_markup(&self, message: &str) -> String {
        let unmentioned = self.slack_mention_pattern.replace_all(message, "");
        self.slack_link_pattern
            .replace_all(&unmentioned, "$1")
            .to_string()
    }

    /// Distinct shortcode names in order of first appearance.
    pub fn shortcodes(&self, message: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for caps in self.shortcode_pattern.captures_iter(message).flatten() {
            if let Some(name) = caps.get(1) {
                if !names.iter().any(|n| n == name.as_str()) {
                    names.push(name.as_str().to_string());
                }
            }
        }
        names
    }

    /// Replace every occurrence of a known shortcode with its token.
    pub fn replace_shortcodes(&self, message: &str, tokens: &HashMap<String, String>) -> String {
        self.shortcode_pattern
            .replace_all(message, |caps: &Captures| -> String {
                match tokens.get(&caps[1]) {
                    Some(token) => token.clone(),
                    None => caps[0].to_string(),
                }
            })
            .to_string()
    }

    /// Convert Discord custom emojis to text representation.
    pub fn resolve_custom_emojis_to_text(&self, message: &str) -> String {
        self.discord_emoji_pattern
            .replace_all(message, ":$1:")
            .to_string()
    }

    /// Remove `<@id>`, `<@!id>`, `<@&id>` and `<#id>` markup.
    pub fn strip_discord_mentions(&self, message: &str) -> String {
        self.discord_mention_pattern
            .replace_all(message, "")
            .to_string()
    }
}

/// Undo the escaping Slack applies to `&`, `<` and `>` in message text.
///
/// `&amp;` goes last so an escaped entity such as `&amp;lt;` decodes to the
/// literal text `&lt;`.
pub fn decode_slack_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// The image attachments, in their original order.
pub fn image_links(attachments: &[Attachment]) -> Vec<ImageLink> {
    attachments
        .iter()
        .filter(|a| a.is_image())
        .map(|a| ImageLink {
            url: a.url.clone(),
            name: a.name.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::discord::emoji::tests::{emoji, FakeEmojiSource};
    use crate::discord::emoji::{CustomEmoji, EmojiCache};

    fn guild() -> GuildId {
        GuildId::new(1)
    }

    fn resolver_with(source: Arc<FakeEmojiSource>, cached: Vec<CustomEmoji>) -> MessageResolver {
        let registry = EmojiRegistry::new(
            source,
            EmojiCache::with_emojis(guild(), cached),
            Duration::from_secs(5),
        );
        MessageResolver::new(registry)
    }

    fn slack() -> SourceContext {
        SourceContext::Slack {
            destination_guild: guild(),
        }
    }

    #[tokio::test]
    async fn test_shortcode_replaced_at_every_occurrence() {
        let source = Arc::new(FakeEmojiSource::new(Vec::new()));
        let resolver = resolver_with(source.clone(), vec![emoji("partyparrot", 42)]);

        let output = resolver
            .normalize(":partyparrot: we shipped :partyparrot:", &slack())
            .await
            .unwrap();
        assert_eq!(output, "<:partyparrot:42> we shipped <:partyparrot:42>");
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_unresolved_shortcode_left_verbatim() {
        let source = Arc::new(FakeEmojiSource::new(vec![emoji("meow", 12)]));
        let resolver = resolver_with(source.clone(), Vec::new());

        let output = resolver.normalize("hi :nope: :meow:", &slack()).await.unwrap();
        assert_eq!(output, "hi :nope: <:meow:12>");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_slack_mentions_stripped_whitespace_kept() {
        let source = Arc::new(FakeEmojiSource::new(Vec::new()));
        let resolver = resolver_with(source.clone(), Vec::new());

        let output = resolver.normalize("hello :wave: <@U123>", &slack()).await.unwrap();
        assert_eq!(output, "hello :wave: ");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_plain_text_is_unchanged() {
        let source = Arc::new(FakeEmojiSource::new(Vec::new()));
        let resolver = resolver_with(source.clone(), Vec::new());

        let text = "coffee at 3? nothing special here";
        let once = resolver.normalize(text, &slack()).await.unwrap();
        let twice = resolver.normalize(&once, &slack()).await.unwrap();
        assert_eq!(once, text);
        assert_eq!(twice, text);
        assert_eq!(source.calls(), 0);

        let discord = resolver.normalize(text, &SourceContext::Discord).await.unwrap();
        assert_eq!(discord, text);
    }

    #[tokio::test]
    async fn test_slack_entities_decoded() {
        let source = Arc::new(FakeEmojiSource::new(Vec::new()));
        let resolver = resolver_with(source, Vec::new());

        let output = resolver
            .normalize("fish &amp; chips &lt;3 &gt; 2", &slack())
            .await
            .unwrap();
        assert_eq!(output, "fish & chips <3 > 2");

        // An escaped entity comes out as literal text, and decoded brackets are not markup
        let output = resolver
            .normalize("write &amp;lt; for &lt;@U123&gt;", &slack())
            .await
            .unwrap();
        assert_eq!(output, "write &lt; for <@U123>");
    }

    #[tokio::test]
    async fn test_emoji_lookup_failure_propagates() {
        let source = Arc::new(FakeEmojiSource::failing());
        let resolver = resolver_with(source, Vec::new());

        assert!(resolver.normalize(":meow:", &slack()).await.is_err());
    }

    #[test]
    fn test_slack_links_unwrapped() {
        let resolver = resolver_with(Arc::new(FakeEmojiSource::new(Vec::new())), Vec::new());

        let output = resolver.strip_slack_markup(
            "see <https://example.com/a?b=1|the docs> or <mailto:ops@example.com|ops> in <#C1|general> <!here>",
        );
        assert_eq!(output, "see https://example.com/a?b=1 or mailto:ops@example.com in  ");
    }

    #[test]
    fn test_shortcodes_are_distinct_in_order() {
        let resolver = resolver_with(Arc::new(FakeEmojiSource::new(Vec::new())), Vec::new());

        let names = resolver.shortcodes(":b: :a: :b: :+1:");
        assert_eq!(names, vec!["b", "a", "+1"]);
    }

    #[tokio::test]
    async fn test_discord_text_normalized() {
        let resolver = resolver_with(Arc::new(FakeEmojiSource::new(Vec::new())), Vec::new());

        let output = resolver
            .normalize(
                "Hello <:pepega:123456789> <@!42> and <@&7> in <#99> <a:dance:987654321>",
                &SourceContext::Discord,
            )
            .await
            .unwrap();
        assert_eq!(output, "Hello :pepega:  and  in  :dance:");
    }

    #[test]
    fn test_image_links_keep_order_and_skip_other_files() {
        let attachments = vec![
            Attachment {
                url: "https://cdn.example/a.png".to_string(),
                name: Some("a.png".to_string()),
                content_type: Some("image/png".to_string()),
            },
            Attachment {
                url: "https://cdn.example/notes.pdf".to_string(),
                name: Some("notes.pdf".to_string()),
                content_type: Some("application/pdf".to_string()),
            },
            Attachment {
                url: "https://cdn.example/b.gif".to_string(),
                name: None,
                content_type: Some("image/gif".to_string()),
            },
        ];

        let links = image_links(&attachments);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://cdn.example/a.png");
        assert_eq!(links[0].name.as_deref(), Some("a.png"));
        assert_eq!(links[1].url, "https://cdn.example/b.gif");
        assert_eq!(links[1].name, None);
    }
}
