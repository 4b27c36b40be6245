//! Author name formatting and length limits.
//!
//! Handles placeholder substitution in author format strings.
//! Supports placeholders: %user, %platform

use crate::common::Platform;

/// Discord rejects webhook usernames longer than this.
pub const DISCORD_USERNAME_LIMIT: usize = 80;

/// Discord rejects message content longer than this.
pub const DISCORD_CONTENT_LIMIT: usize = 2000;

/// Formatter that renders the author name a relayed message is posted under.
#[derive(Debug, Clone)]
pub struct NameFormatter {
    format: String,
}

impl NameFormatter {
    /// Create a new formatter with the given format string.
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }

    /// Format an author name with the given context.
    ///
    /// Substitutes the following placeholders:
    /// - `%user` - Display name on the source platform
    /// - `%platform` - Source platform name
    pub fn format(&self, ctx: &FormatContext) -> String {
        self.format
            .replace("%user", &ctx.user)
            .replace("%platform", ctx.platform.name())
    }
}

/// Context for name formatting.
#[derive(Debug, Clone)]
pub struct FormatContext {
    pub user: String,
    pub platform: Platform,
}

impl FormatContext {
    pub fn new(user: impl Into<String>, platform: Platform) -> Self {
        Self {
            user: user.into(),
            platform,
        }
    }
}

/// Truncate `text` to at most `max` characters, marking the cut with an ellipsis.
pub fn clamp_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }

    let mut clamped: String = text.chars().take(max - 1).collect();
    clamped.push('…');
    clamped
}
