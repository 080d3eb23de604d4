//! Dictionary Oracle (§6 collaborator contract): pure lookup, no I/O after
//! initial load. Out of core scope per §1 ("dictionary file loading and
//! normalization" is an external collaborator); this module only defines the
//! trait seam and a small in-memory stub so the submission pipeline has
//! something to call in tests and in a standalone binary.
//!
//! Grounded on `database/mod.rs`'s trait-plus-single-impl shape.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::protocol::types::{DictionaryVerdict, GameLanguage};

#[async_trait]
pub trait DictionaryOracle: Send + Sync {
    /// `isValidWord(word, lang)` (§6): pure lookup, tri-state result.
    /// `Unknown` means the dictionary for `lang` is not loaded.
    async fn lookup(&self, normalized_word: &str, language: GameLanguage) -> DictionaryVerdict;
}

/// Verdict from the AI word-validation collaborator (§6): `validateWordWithAI`.
/// `Unavailable` covers both "service down" and "timed out" — callers treat it
/// the same as an invalid result, just without the `aiVerified` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiVerdict {
    Valid,
    Invalid,
    Unavailable,
}

/// `validateWordWithAI`/`validateWordsWithAI` (§6 collaborator contract). The
/// AI word-validation service itself is out of core scope (§1 Non-goals); this
/// trait is only the seam the submission pipeline and end-of-round pass call
/// through. Grounded on `DictionaryOracle`'s trait-plus-stub shape above.
#[async_trait]
pub trait AiWordOracle: Send + Sync {
    async fn validate_word(&self, word: &str, language: GameLanguage) -> AiVerdict;
}

/// Always reports the service as unavailable. Used where no real AI
/// collaborator is wired up (standalone runs, most tests).
#[derive(Debug, Default)]
pub struct UnavailableAiWordOracle;

#[async_trait]
impl AiWordOracle for UnavailableAiWordOracle {
    async fn validate_word(&self, _word: &str, _language: GameLanguage) -> AiVerdict {
        AiVerdict::Unavailable
    }
}

/// Small in-memory word list per language, for tests and standalone runs.
/// A production deployment wires a real dictionary-loading collaborator
/// behind the same trait (§1 Out of scope).
#[derive(Debug, Default)]
pub struct InMemoryDictionaryOracle {
    words_by_language: HashMap<GameLanguage, HashSet<String>>,
}

impl InMemoryDictionaryOracle {
    #[must_use]
    pub fn new() -> Self {
        Self {
            words_by_language: HashMap::new(),
        }
    }

    /// Loads a language's word list. Words are normalized (lowercased) on
    /// insertion so lookups can match `normalize_candidate`'s output directly.
    pub fn load_language(&mut self, language: GameLanguage, words: impl IntoIterator<Item = String>) {
        let set = self.words_by_language.entry(language).or_default();
        set.extend(words.into_iter().map(|w| w.to_lowercase()));
    }

    #[must_use]
    pub fn with_language(mut self, language: GameLanguage, words: impl IntoIterator<Item = String>) -> Self {
        self.load_language(language, words);
        self
    }

    #[must_use]
    pub fn is_loaded(&self, language: GameLanguage) -> bool {
        self.words_by_language.contains_key(&language)
    }
}

#[async_trait]
impl DictionaryOracle for InMemoryDictionaryOracle {
    async fn lookup(&self, normalized_word: &str, language: GameLanguage) -> DictionaryVerdict {
        match self.words_by_language.get(&language) {
            None => DictionaryVerdict::Unknown,
            Some(words) => {
                if words.contains(normalized_word) {
                    DictionaryVerdict::Valid
                } else {
                    DictionaryVerdict::Invalid
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_oracle() -> InMemoryDictionaryOracle {
        InMemoryDictionaryOracle::new().with_language(
            GameLanguage::En,
            ["cat", "dog", "cog"].into_iter().map(str::to_string),
        )
    }

    #[tokio::test]
    async fn known_word_is_valid() {
        let oracle = sample_oracle();
        assert_eq!(
            oracle.lookup("cat", GameLanguage::En).await,
            DictionaryVerdict::Valid
        );
    }

    #[tokio::test]
    async fn unknown_word_in_loaded_language_is_invalid() {
        let oracle = sample_oracle();
        assert_eq!(
            oracle.lookup("qzx", GameLanguage::En).await,
            DictionaryVerdict::Invalid
        );
    }

    #[tokio::test]
    async fn unloaded_language_is_unknown() {
        let oracle = sample_oracle();
        assert_eq!(
            oracle.lookup("cat", GameLanguage::Ja).await,
            DictionaryVerdict::Unknown
        );
    }
}
