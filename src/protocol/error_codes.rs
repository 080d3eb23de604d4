use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for structured error handling, extending the predecessor's
/// category scheme with an 8xxx word/game category (SPEC_FULL.md §10.3).
/// Authority(4xxx) is reinterpreted as host-transfer errors; Spectator(7xxx)
/// is reinterpreted as late-join errors — both generalizations, not drops.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication errors (1xxx)
    Unauthorized,
    InvalidToken,
    AuthenticationRequired,

    // Validation errors (2xxx)
    InvalidInput,
    InvalidRoomName,
    InvalidRoomCode,
    InvalidParticipantName,
    InvalidMaxPlayers,
    MessageTooLarge,
    UsernameRequired,

    // Room errors (3xxx)
    RoomNotFound,
    RoomFull,
    AlreadyInRoom,
    NotInRoom,
    NotInGame,
    RoomCreationFailed,
    InvalidRoomState,
    CodeInUse,

    // Host / authority-transfer errors (4xxx)
    OnlyHostCanStart,
    OnlyHostCanEnd,
    HostTransferFailed,

    // Rate limiting (5xxx)
    RateLimitExceeded,
    TooManyConnections,

    // Reconnection errors (6xxx)
    ReconnectionFailed,
    ReconnectionTokenInvalid,
    ReconnectionExpired,
    PlayerAlreadyConnected,

    // Late-join / spectator errors (7xxx)
    LateJoinBlocked,
    LateJoinFailed,

    // Word / game errors (8xxx)
    WordTooShort,
    NotOnBoard,
    AlreadyFound,
    InappropriateWord,
    GameNotInProgress,

    // Server errors (9xxx)
    InternalError,
    StorageError,
    ServiceUnavailable,
}

impl ErrorCode {
    /// Returns a human-readable description of this error code.
    ///
    /// This method provides actionable error messages that SDK developers
    /// can display to end users or use for debugging.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            // Authentication errors (1xxx)
            Self::Unauthorized => {
                "Access denied. Authentication credentials are missing or invalid."
            }
            Self::InvalidToken => {
                "The authentication token is invalid, malformed, or has expired. Please obtain a new token."
            }
            Self::AuthenticationRequired => {
                "This operation requires authentication. Please provide valid credentials."
            }

            // Validation errors (2xxx)
            Self::InvalidInput => {
                "The provided input is invalid or malformed. Check your request parameters."
            }
            Self::InvalidRoomName => {
                "The room name is invalid. Room names must be non-empty and follow naming requirements."
            }
            Self::InvalidRoomCode => {
                "The room code is invalid or malformed. Room codes must follow the required format."
            }
            Self::InvalidParticipantName => {
                "The participant name is invalid. Names must be non-empty and meet length requirements."
            }
            Self::InvalidMaxPlayers => {
                "The maximum player count is invalid. It must be a positive number within allowed limits."
            }
            Self::MessageTooLarge => {
                "The message size exceeds the maximum allowed limit. Please send a smaller message."
            }
            Self::UsernameRequired => {
                "A display name is required to join this room."
            }

            // Room errors (3xxx)
            Self::RoomNotFound => {
                "The requested room could not be found. It may have been closed or the code is incorrect."
            }
            Self::RoomFull => {
                "The room has reached its maximum player capacity. Try joining a different room."
            }
            Self::AlreadyInRoom => {
                "You are already in a room. Leave the current room before joining another."
            }
            Self::NotInRoom => {
                "You are not currently in any room. Join a room before performing this action."
            }
            Self::NotInGame => {
                "You are not currently participating in this game."
            }
            Self::RoomCreationFailed => {
                "Failed to create the room. Please try again or contact support if the issue persists."
            }
            Self::InvalidRoomState => {
                "The room is in an invalid state for this operation. Try refreshing or rejoining the room."
            }
            Self::CodeInUse => {
                "This room code is already in use by another active game."
            }

            // Host / authority-transfer errors (4xxx)
            Self::OnlyHostCanStart => {
                "Only the room host can start the round."
            }
            Self::OnlyHostCanEnd => {
                "Only the room host can end the round."
            }
            Self::HostTransferFailed => {
                "Host transfer failed; no eligible participant was available to take over."
            }

            // Rate limiting (5xxx)
            Self::RateLimitExceeded => {
                "Too many requests in a short time. Please slow down and try again later."
            }
            Self::TooManyConnections => {
                "You have too many active connections. Close some connections before opening new ones."
            }

            // Reconnection errors (6xxx)
            Self::ReconnectionFailed => {
                "Failed to reconnect to the room. The session may have expired or the room may be closed."
            }
            Self::ReconnectionTokenInvalid => {
                "The reconnection token is invalid or malformed. You may need to join the room again."
            }
            Self::ReconnectionExpired => {
                "The reconnection window has expired. You must join the room again as a new player."
            }
            Self::PlayerAlreadyConnected => {
                "This player is already connected to the room from another session."
            }

            // Late-join errors (7xxx)
            Self::LateJoinBlocked => {
                "This room does not allow joining after the round has started."
            }
            Self::LateJoinFailed => {
                "Failed to join the in-progress round. Please try again."
            }

            // Word / game errors (8xxx)
            Self::WordTooShort => {
                "The submitted word is shorter than this room's minimum word length."
            }
            Self::NotOnBoard => {
                "The submitted word cannot be traced as a path on the current letter grid."
            }
            Self::AlreadyFound => {
                "You have already submitted this word this round."
            }
            Self::InappropriateWord => {
                "The submitted word was rejected by the profanity filter."
            }
            Self::GameNotInProgress => {
                "Words can only be submitted while a round is in progress."
            }

            // Server errors (9xxx)
            Self::InternalError => {
                "An internal server error occurred. Please try again or contact support if the issue persists."
            }
            Self::StorageError => {
                "A storage error occurred while processing your request. Please try again later."
            }
            Self::ServiceUnavailable => {
                "The service is temporarily unavailable. Please try again in a few moments."
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[ErrorCode] = &[
        ErrorCode::Unauthorized,
        ErrorCode::InvalidToken,
        ErrorCode::AuthenticationRequired,
        ErrorCode::InvalidInput,
        ErrorCode::InvalidRoomName,
        ErrorCode::InvalidRoomCode,
        ErrorCode::InvalidParticipantName,
        ErrorCode::InvalidMaxPlayers,
        ErrorCode::MessageTooLarge,
        ErrorCode::UsernameRequired,
        ErrorCode::RoomNotFound,
        ErrorCode::RoomFull,
        ErrorCode::AlreadyInRoom,
        ErrorCode::NotInRoom,
        ErrorCode::NotInGame,
        ErrorCode::RoomCreationFailed,
        ErrorCode::InvalidRoomState,
        ErrorCode::CodeInUse,
        ErrorCode::OnlyHostCanStart,
        ErrorCode::OnlyHostCanEnd,
        ErrorCode::HostTransferFailed,
        ErrorCode::RateLimitExceeded,
        ErrorCode::TooManyConnections,
        ErrorCode::ReconnectionFailed,
        ErrorCode::ReconnectionTokenInvalid,
        ErrorCode::ReconnectionExpired,
        ErrorCode::PlayerAlreadyConnected,
        ErrorCode::LateJoinBlocked,
        ErrorCode::LateJoinFailed,
        ErrorCode::WordTooShort,
        ErrorCode::NotOnBoard,
        ErrorCode::AlreadyFound,
        ErrorCode::InappropriateWord,
        ErrorCode::GameNotInProgress,
        ErrorCode::InternalError,
        ErrorCode::StorageError,
        ErrorCode::ServiceUnavailable,
    ];

    #[test]
    fn test_all_error_codes_have_descriptions() {
        for error_code in ALL {
            let description = error_code.description();
            assert!(
                !description.is_empty(),
                "ErrorCode::{error_code:?} has empty description"
            );
            assert!(
                description.len() > 10,
                "ErrorCode::{error_code:?} has suspiciously short description: '{description}'"
            );
        }
    }

    #[test]
    fn test_display_uses_description() {
        let error = ErrorCode::RoomNotFound;
        assert_eq!(format!("{error}"), error.description());
    }

    #[test]
    fn test_sample_descriptions() {
        assert!(ErrorCode::WordTooShort.description().contains("minimum word length"));
        assert!(ErrorCode::NotOnBoard.description().contains("letter grid"));
        assert!(ErrorCode::RateLimitExceeded.description().contains("Too many requests"));
        assert!(ErrorCode::CodeInUse.description().contains("already in use"));
    }

    #[test]
    fn test_serialization_unchanged_shape() {
        let error = ErrorCode::RoomNotFound;
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, "\"ROOM_NOT_FOUND\"");

        let word_error = ErrorCode::NotOnBoard;
        let json = serde_json::to_string(&word_error).unwrap();
        assert_eq!(json, "\"NOT_ON_BOARD\"");
    }
}
