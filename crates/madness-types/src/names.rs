//! Player and poster identity types.
//!
//! RuneScape names arrive with arbitrary casing and stray whitespace
//! depending on which plugin or chat line produced them. Every map in the
//! bot is keyed by [`PlayerName`], which stores the trimmed, lowercased
//! form so that `" EvilGuy"` and `"evilguy"` are the same player. The
//! original casing is only kept on the events themselves for display.

use serde::{Deserialize, Serialize};

/// A normalized (trimmed, lowercased) player name.
///
/// Use [`PlayerName::parse`] for untrusted input: it rejects names that
/// are empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PlayerName(String);

impl PlayerName {
    /// Normalize a raw name, returning `None` if nothing is left after
    /// trimming.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    /// Return the normalized name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Trim and lowercase a raw player name.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl From<String> for PlayerName {
    fn from(raw: String) -> Self {
        Self(normalize(&raw))
    }
}

impl From<&str> for PlayerName {
    fn from(raw: &str) -> Self {
        Self(normalize(raw))
    }
}

impl From<PlayerName> for String {
    fn from(name: PlayerName) -> Self {
        name.0
    }
}

impl core::fmt::Display for PlayerName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of whoever pledged GP to a bounty (a Discord user ID in
/// practice). Opaque to the bot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PosterId(pub String);

impl PosterId {
    /// Create a poster ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PosterId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl core::fmt::Display for PosterId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
