use serde::{Deserialize, Serialize};

use super::error_codes::ErrorCode;
use super::room_state::WordDetail;
use super::types::{GameLanguage, GameState, GridCell, PresenceStatus};

/// Inbound wire actions (§6). Names are the wire action strings; fields carry
/// exactly what each handler needs, per SPEC_FULL.md §9's "duck-typed message
/// objects become tagged-variant message types" redesign note.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "createGame")]
    CreateGame {
        code: String,
        host_name: String,
        language: GameLanguage,
        #[serde(default)]
        is_ranked: bool,
        #[serde(default)]
        avatar: Option<String>,
        #[serde(default)]
        auth_user_id: Option<String>,
        #[serde(default)]
        guest_token_hash: Option<String>,
    },
    #[serde(rename = "join")]
    Join {
        code: String,
        name: String,
        #[serde(default)]
        avatar: Option<String>,
        #[serde(default)]
        auth_user_id: Option<String>,
        #[serde(default)]
        guest_token_hash: Option<String>,
    },
    #[serde(rename = "startGame")]
    StartGame {
        grid: Vec<Vec<GridCell>>,
        seconds: u32,
        min_word_length: usize,
    },
    #[serde(rename = "startGameAck")]
    StartGameAck { message_id: String },
    #[serde(rename = "submitWord")]
    SubmitWord { candidate: String, combo_level: u8 },
    #[serde(rename = "chatMessage")]
    ChatMessage { text: String },
    #[serde(rename = "endGame")]
    EndGame,
    #[serde(rename = "validateWords")]
    ValidateWords { approved_words: Vec<String> },
    #[serde(rename = "resetGame")]
    ResetGame,
    #[serde(rename = "closeRoom")]
    CloseRoom,
    #[serde(rename = "getActiveRooms")]
    GetActiveRooms,
    #[serde(rename = "leaveRoom")]
    LeaveRoom,
    #[serde(rename = "presenceUpdate")]
    PresenceUpdate { focused: bool, idle: bool },
    #[serde(rename = "presenceHeartbeat")]
    PresenceHeartbeat,
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "submitWordVote")]
    SubmitWordVote {
        word: String,
        #[serde(default)]
        approve: bool,
    },
}

/// Outcome of a single word submission, used both in the live `wordAccepted`/
/// `wordNeedsValidation` events and (by reference) in end-of-round scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordOutcomePayload {
    pub word: String,
    pub score: u32,
    pub base_score: u32,
    pub combo_bonus: u32,
    pub combo_level: u8,
    pub auto_validated: bool,
    pub ai_verified: bool,
}

/// Roster entry broadcast in `updateUsers`/`joined`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub name: String,
    pub avatar: Option<String>,
    pub is_host: bool,
    pub score: u32,
    pub disconnected: bool,
    pub presence_status: PresenceStatus,
}

/// Large payload for the `joined` event; boxed in `ServerMessage` per the
/// predecessor's large-variant convention (`RoomJoinedPayload`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinedPayload {
    pub code: String,
    pub room_name: String,
    pub language: GameLanguage,
    pub game_state: GameState,
    pub is_host: bool,
    pub reconnected: bool,
    pub users: Vec<ParticipantSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<Vec<Vec<GridCell>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u32>,
}

/// Outbound events (§6). Variants carrying large nested payloads are boxed
/// to keep the enum's stack footprint small, mirroring the predecessor's
/// `Box<RoomJoinedPayload>` treatment of `RoomJoined`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "joined")]
    Joined(Box<JoinedPayload>),
    #[serde(rename = "updateUsers")]
    UpdateUsers { users: Vec<ParticipantSummary> },
    #[serde(rename = "activeRooms")]
    ActiveRooms { rooms: Vec<ActiveRoomSummary> },
    #[serde(rename = "startGame")]
    StartGame {
        grid: Vec<Vec<GridCell>>,
        seconds: u32,
        language: GameLanguage,
        min_word_length: usize,
        message_id: String,
        #[serde(default)]
        skip_ack: bool,
    },
    #[serde(rename = "timeUpdate")]
    TimeUpdate { remaining_seconds: u32 },
    #[serde(rename = "wordAccepted")]
    WordAccepted(WordOutcomePayload),
    #[serde(rename = "wordRejected")]
    WordRejected { word: String, reason: String },
    #[serde(rename = "wordAlreadyFound")]
    WordAlreadyFound { word: String },
    #[serde(rename = "wordNotOnBoard")]
    WordNotOnBoard { word: String },
    #[serde(rename = "wordTooShort")]
    WordTooShort { word: String, min_word_length: usize },
    #[serde(rename = "wordNeedsValidation")]
    WordNeedsValidation { word: String },
    #[serde(rename = "wordValidatingWithAI")]
    WordValidatingWithAI { word: String },
    #[serde(rename = "liveAchievementUnlocked")]
    LiveAchievementUnlocked { participant: String, achievement: String },
    #[serde(rename = "updateLeaderboard")]
    UpdateLeaderboard { scores: Vec<(String, u32)> },
    #[serde(rename = "endGame")]
    EndGame,
    #[serde(rename = "showValidation")]
    ShowValidation { non_dictionary_words: Vec<String> },
    #[serde(rename = "validationTimeoutStarted")]
    ValidationTimeoutStarted { deadline_seconds: u32 },
    #[serde(rename = "validatedScores")]
    ValidatedScores(Box<ValidatedScoresPayload>),
    #[serde(rename = "validationComplete")]
    ValidationComplete,
    #[serde(rename = "autoValidationOccurred")]
    AutoValidationOccurred,
    #[serde(rename = "chatMessage")]
    ChatMessage { from: String, text: String },
    #[serde(rename = "hostDisconnected")]
    HostDisconnected { grace_period_ms: u64 },
    #[serde(rename = "hostTransferred")]
    HostTransferred { new_host: String },
    #[serde(rename = "hostLeftRoomClosing")]
    HostLeftRoomClosing,
    #[serde(rename = "playerDisconnected")]
    PlayerDisconnected { name: String },
    #[serde(rename = "playerReconnected")]
    PlayerReconnected { name: String },
    #[serde(rename = "playerLeft")]
    PlayerLeft { name: String },
    #[serde(rename = "playerConnectionStatusChanged")]
    PlayerConnectionStatusChanged { name: String, status: PresenceStatus },
    #[serde(rename = "sessionMigrated")]
    SessionMigrated { new_code: String },
    #[serde(rename = "sessionTakenOver")]
    SessionTakenOver { game_code: String },
    #[serde(rename = "rateLimited")]
    RateLimited { operation: String },
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "serverShutdown")]
    ServerShutdown,
    #[serde(rename = "warning")]
    Warning { kind: String, message: String },
    #[serde(rename = "error")]
    Error { code: ErrorCode, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveRoomSummary {
    pub code: String,
    pub room_name: String,
    pub participant_count: u8,
    pub max_players: u8,
    pub game_state: GameState,
}

/// Payload for `validatedScores`, the end-of-round broadcast (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedScoresPayload {
    pub scores: Vec<(String, u32)>,
    pub grid: Vec<Vec<GridCell>>,
    pub word_details: std::collections::HashMap<String, Vec<WordDetail>>,
    pub titles: std::collections::HashMap<String, String>,
}
