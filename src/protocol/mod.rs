// Protocol module: message types, validation, and room state management

pub mod error_codes;
pub mod messages;
pub mod room_codes;
pub mod room_state;
pub mod types;
pub mod validation;

// Re-export everything for convenience so `use crate::protocol::*` works
// from the server/coordination layers without reaching into submodules.

pub use error_codes::ErrorCode;

pub use types::{
    AuthUserId, ConnectionId, DepartureReason, DictionaryVerdict, GameLanguage, GameState,
    GridCell, ParticipantNameRulesPayload, PresenceStatus, ProtocolInfoPayload, RoomCode,
    DEFAULT_MAX_PARTICIPANT_NAME_LENGTH, DEFAULT_MAX_PLAYERS_LIMIT, DEFAULT_MAX_ROOM_NAME_LENGTH,
    DEFAULT_REGION_ID, DEFAULT_ROOM_CODE_LENGTH, MAX_COMBO_LEVEL, MAX_WORD_LENGTH,
    MIN_WORD_LENGTH_FLOOR,
};

pub use messages::{
    ActiveRoomSummary, ClientMessage, JoinedPayload, ParticipantSummary, ServerMessage,
    ValidatedScoresPayload, WordOutcomePayload,
};

pub use room_state::{GameStartBarrier, ParticipantRecord, Room, WordDetail};
