//! Protocol configuration: room/participant naming rules and limits.

use super::defaults::{
    default_allow_leading_trailing_whitespace, default_allow_spaces_in_participant_names,
    default_allow_unicode_participant_names, default_allowed_participant_name_symbols,
    default_max_participant_name_length, default_max_players_limit, default_max_room_name_length,
    default_min_word_length, default_room_code_length,
};
use serde::{Deserialize, Serialize};

/// Protocol configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProtocolConfig {
    /// Maximum length for room names
    #[serde(default = "default_max_room_name_length")]
    pub max_room_name_length: usize,
    /// Length of generated room codes (§4.3 collision-checked generator)
    #[serde(default = "default_room_code_length")]
    pub room_code_length: usize,
    /// Maximum length for participant names
    #[serde(default = "default_max_participant_name_length")]
    pub max_participant_name_length: usize,
    /// Maximum number of participants allowed in a room
    #[serde(default = "default_max_players_limit")]
    pub max_players_limit: u8,
    /// Floor for a room's configured minimum accepted word length (§4.5)
    #[serde(default = "default_min_word_length")]
    pub default_min_word_length: usize,
    /// Participant name validation rules
    #[serde(default)]
    pub participant_name_validation: PlayerNameValidationConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_room_name_length: default_max_room_name_length(),
            room_code_length: default_room_code_length(),
            max_participant_name_length: default_max_participant_name_length(),
            max_players_limit: default_max_players_limit(),
            default_min_word_length: default_min_word_length(),
            participant_name_validation: PlayerNameValidationConfig::default(),
        }
    }
}

/// Participant name validation configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlayerNameValidationConfig {
    /// Allow non-ASCII letters/digits (Unicode alphanumerics)
    #[serde(default = "default_allow_unicode_participant_names")]
    pub allow_unicode_alphanumeric: bool,
    /// Permit spaces between words (internal spaces only by default)
    #[serde(default = "default_allow_spaces_in_participant_names")]
    pub allow_spaces: bool,
    /// Permit leading or trailing whitespace (still trimmed when checking emptiness)
    #[serde(default = "default_allow_leading_trailing_whitespace")]
    pub allow_leading_trailing_whitespace: bool,
    /// Symbol characters that are always allowed in addition to alphanumeric chars
    #[serde(default = "default_allowed_participant_name_symbols")]
    pub allowed_symbols: Vec<char>,
    /// Optional string of additional characters that should be accepted
    #[serde(default)]
    pub additional_allowed_characters: Option<String>,
}

impl Default for PlayerNameValidationConfig {
    fn default() -> Self {
        Self {
            allow_unicode_alphanumeric: default_allow_unicode_participant_names(),
            allow_spaces: default_allow_spaces_in_participant_names(),
            allow_leading_trailing_whitespace: default_allow_leading_trailing_whitespace(),
            allowed_symbols: default_allowed_participant_name_symbols(),
            additional_allowed_characters: None,
        }
    }
}

impl PlayerNameValidationConfig {
    #[must_use]
    pub fn is_allowed_symbol(&self, ch: char) -> bool {
        if self.allowed_symbols.contains(&ch) {
            return true;
        }
        if let Some(extra) = &self.additional_allowed_characters {
            return extra.chars().any(|extra_ch| extra_ch == ch);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_name_validation_config_defaults() {
        let config = PlayerNameValidationConfig::default();
        assert!(config.is_allowed_symbol('-'));
        assert!(config.is_allowed_symbol('_'));
        assert!(!config.is_allowed_symbol('@'));

        let config_with_extra = PlayerNameValidationConfig {
            additional_allowed_characters: Some("@#".to_string()),
            ..Default::default()
        };
        assert!(config_with_extra.is_allowed_symbol('@'));
        assert!(!config_with_extra.is_allowed_symbol('!'));
    }
}
