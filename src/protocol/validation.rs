use crate::config::ProtocolConfig;
use std::collections::HashMap;

use super::room_state::ParticipantRecord;
use super::types::MAX_WORD_LENGTH;

pub fn validate_room_name_with_config(name: &str, config: &ProtocolConfig) -> Result<(), String> {
    if name.is_empty() {
        return Err("Room name cannot be empty".to_string());
    }
    if name.len() > config.max_room_name_length {
        return Err(format!(
            "Room name too long (max {} characters)",
            config.max_room_name_length
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == ' ')
    {
        return Err("Room name contains invalid characters".to_string());
    }
    Ok(())
}

pub fn validate_room_code_with_config(code: &str, config: &ProtocolConfig) -> Result<(), String> {
    if code.is_empty() {
        return Err("Room code cannot be empty".to_string());
    }
    if code.len() != config.room_code_length {
        return Err(format!(
            "Room code must be exactly {} characters",
            config.room_code_length
        ));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("Room code must be alphanumeric".to_string());
    }
    Ok(())
}

pub fn validate_participant_name_with_config(
    name: &str,
    config: &ProtocolConfig,
) -> Result<(), String> {
    if name.is_empty() {
        return Err("Participant name cannot be empty".to_string());
    }
    if name.len() > config.max_participant_name_length {
        return Err(format!(
            "Participant name too long (max {} characters)",
            config.max_participant_name_length
        ));
    }

    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Participant name cannot be blank".to_string());
    }

    let rules = &config.participant_name_validation;
    if !rules.allow_leading_trailing_whitespace && trimmed.len() != name.len() {
        return Err("Participant name cannot have leading or trailing whitespace".to_string());
    }

    for ch in name.chars() {
        if ch == ' ' {
            if rules.allow_spaces {
                continue;
            }
            return Err("Participant name cannot contain spaces".to_string());
        }

        if ch.is_whitespace() {
            return Err("Participant name cannot contain whitespace characters".to_string());
        }

        let is_alphanumeric = if rules.allow_unicode_alphanumeric {
            ch.is_alphanumeric()
        } else {
            ch.is_ascii_alphanumeric()
        };

        if is_alphanumeric || rules.is_allowed_symbol(ch) {
            continue;
        }

        return Err("Participant name contains invalid characters".to_string());
    }

    Ok(())
}

pub fn validate_participant_name_uniqueness(
    name: &str,
    existing_participants: &HashMap<String, ParticipantRecord>,
) -> Result<(), String> {
    let normalized_name = name.to_lowercase();
    for participant in existing_participants.values() {
        if participant.name.to_lowercase() == normalized_name {
            return Err("Participant name already in use in this room".to_string());
        }
    }
    Ok(())
}

pub fn validate_max_players_with_config(
    max_players: u8,
    config: &ProtocolConfig,
) -> Result<(), String> {
    if max_players < 1 {
        return Err("Max players must be at least 1".to_string());
    }
    if max_players > config.max_players_limit {
        return Err(format!(
            "Max players cannot exceed {}",
            config.max_players_limit
        ));
    }
    Ok(())
}

/// Normalizes a candidate submission: trims and lowercases, for both the
/// dictionary lookup and the per-participant dedup check (§4.5, §3 invariant 3).
#[must_use]
pub fn normalize_candidate(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Validates candidate length against the room's configured minimum and the
/// hard ceiling in §4.5 step 2.
pub fn validate_candidate_length(normalized: &str, min_word_length: usize) -> Result<(), String> {
    let len = normalized.chars().count();
    if normalized.is_empty() || len < min_word_length {
        return Err(format!(
            "Candidate must be at least {min_word_length} characters"
        ));
    }
    if len > MAX_WORD_LENGTH {
        return Err(format!("Candidate exceeds {MAX_WORD_LENGTH} characters"));
    }
    Ok(())
}

// Legacy validation functions using default constants, kept for callers that
// do not have a `ProtocolConfig` handy (matches the predecessor's
// default-config convenience wrappers).
#[allow(dead_code)]
pub fn validate_room_name(name: &str) -> Result<(), &'static str> {
    let cfg = ProtocolConfig::default();
    validate_room_name_with_config(name, &cfg).map_err(|_| "Invalid room name")
}

#[allow(dead_code)]
pub fn validate_room_code(code: &str) -> Result<(), &'static str> {
    let cfg = ProtocolConfig::default();
    validate_room_code_with_config(code, &cfg).map_err(|_| "Invalid room code")
}

#[allow(dead_code)]
pub fn validate_participant_name(name: &str) -> Result<(), &'static str> {
    let cfg = ProtocolConfig::default();
    validate_participant_name_with_config(name, &cfg).map_err(|_| "Invalid participant name")
}
