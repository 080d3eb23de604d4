use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default constants for validation (can be overridden by config)
/// These are used when no config is available
#[allow(dead_code)]
pub const DEFAULT_MAX_ROOM_NAME_LENGTH: usize = 64;
#[allow(dead_code)]
pub const DEFAULT_ROOM_CODE_LENGTH: usize = 4;
#[allow(dead_code)]
pub const DEFAULT_MAX_PARTICIPANT_NAME_LENGTH: usize = 32;
#[allow(dead_code)]
pub const DEFAULT_MAX_PLAYERS_LIMIT: u8 = 16;
/// Default deployment region identifier when one is not configured.
pub const DEFAULT_REGION_ID: &str = "default";

/// Floor and ceiling for a room's minimum-word-length setting.
pub const MIN_WORD_LENGTH_FLOOR: usize = 2;
pub const MAX_WORD_LENGTH: usize = 50;
/// `combo` is bounded 0..=10 per §3's invariant.
pub const MAX_COMBO_LEVEL: u8 = 10;

/// Opaque handle identifying a single transport connection.
pub type ConnectionId = Uuid;
/// 4-character room/game code, e.g. `"3H7K"`.
pub type RoomCode = String;
/// Unique identifier for an authenticated user (carried on join/createGame).
pub type AuthUserId = String;

/// Supported dictionary languages (§3).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum GameLanguage {
    En,
    He,
    Sv,
    Ja,
}

impl Default for GameLanguage {
    fn default() -> Self {
        GameLanguage::En
    }
}

impl GameLanguage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GameLanguage::En => "en",
            GameLanguage::He => "he",
            GameLanguage::Sv => "sv",
            GameLanguage::Ja => "ja",
        }
    }
}

impl std::fmt::Display for GameLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single cell of the letter grid. Modeled as `char` rather than a
/// multi-character token, per the adjacency Open Question resolution in
/// DESIGN.md.
pub type GridCell = char;

/// Tri-state dictionary lookup result (§6 Dictionary Oracle contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictionaryVerdict {
    Valid,
    Invalid,
    Unknown,
}

/// Presence classification for a connected participant (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Active,
    Idle,
    Weak,
    Away,
}

impl Default for PresenceStatus {
    fn default() -> Self {
        PresenceStatus::Active
    }
}

/// Game state machine (§3 `gameState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameState {
    Waiting,
    InProgress,
    Finished,
}

impl Default for GameState {
    fn default() -> Self {
        GameState::Waiting
    }
}

/// Why a participant stopped being an active room occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepartureReason {
    VoluntaryLeave,
    DisconnectExpired,
    RoomClosed,
    HostClosedRoom,
}

/// Rules payload describing participant-name validation, echoed to clients
/// so SDKs can pre-validate before sending `join`/`createGame`. Mirrors the
/// predecessor's `PlayerNameRulesPayload` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantNameRulesPayload {
    pub max_length: usize,
    pub min_length: usize,
    pub allow_unicode_alphanumeric: bool,
    pub allow_spaces: bool,
    pub allow_leading_trailing_whitespace: bool,
    #[serde(default)]
    pub allowed_symbols: Vec<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_allowed_characters: Option<String>,
}

impl ParticipantNameRulesPayload {
    #[must_use]
    pub fn from_protocol_config(config: &crate::config::ProtocolConfig) -> Self {
        let rules = &config.participant_name_validation;
        Self {
            max_length: config.max_participant_name_length,
            min_length: 1,
            allow_unicode_alphanumeric: rules.allow_unicode_alphanumeric,
            allow_spaces: rules.allow_spaces,
            allow_leading_trailing_whitespace: rules.allow_leading_trailing_whitespace,
            allowed_symbols: rules.allowed_symbols.clone(),
            additional_allowed_characters: rules.additional_allowed_characters.clone(),
        }
    }
}

/// Describes negotiated protocol capabilities returned during the initial
/// handshake, mirroring the predecessor's `ProtocolInfoPayload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolInfoPayload {
    #[serde(default)]
    pub supported_languages: Vec<GameLanguage>,
    pub room_code_length: usize,
    pub min_word_length_floor: usize,
    pub max_combo_level: u8,
    pub participant_name_rules: ParticipantNameRulesPayload,
}
