//! Profanity filter (§4.5 step 3): a small, swappable, exact-match
//! blocklist. Deliberately not a moderation service — just enough to keep an
//! obviously-bad word out of a submitted-words list before dictionary lookup.
//! No predecessor analogue; grounded on `protocol::validation`'s plain
//! pure-function style.

use std::collections::HashSet;

/// Illustrative default list. A real deployment swaps this for a curated one
/// (§6 Out of scope: content moderation policy is an external collaborator);
/// this module only defines the filter shape.
const DEFAULT_BLOCKLIST: &[&str] = &["damn", "hell", "ass", "crap"];

#[derive(Debug, Clone)]
pub struct ProfanityFilter {
    blocked: HashSet<String>,
}

impl Default for ProfanityFilter {
    fn default() -> Self {
        Self::with_words(DEFAULT_BLOCKLIST.iter().map(|s| (*s).to_string()))
    }
}

impl ProfanityFilter {
    #[must_use]
    pub fn with_words(words: impl IntoIterator<Item = String>) -> Self {
        Self {
            blocked: words.into_iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    /// Exact match against the normalized (already-lowercased) candidate.
    #[must_use]
    pub fn is_blocked(&self, normalized_word: &str) -> bool {
        self.blocked.contains(normalized_word)
    }
}
