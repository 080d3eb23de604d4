use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::types::{
    AuthUserId, ConnectionId, GameLanguage, GameState, GridCell, PresenceStatus, RoomCode,
};

// ============================================================================
// ROOM LIFECYCLE
// ============================================================================
//
// A room is created when a host arrives with a fresh code (§3 Lifecycle).
// It moves between three states:
//
// ```text
// [*] --> Waiting: Room Created
// Waiting --> InProgress: startRound (host)
// InProgress --> Finished: timer reaches 0, or endRound (host)
// Finished --> Waiting: resetRoom (host), participants preserved
// {Waiting,InProgress,Finished} --> [*]: closeRoom, host-disconnect-with-no-
//     eligible-hand-off, or sweeper finds the room empty past the idle
//     threshold.
// ```
//
// Unlike the predecessor's lobby-readiness model (no auto-reassignment of
// "authority" on disconnect), this Room performs an explicit host hand-off
// on disconnect timeout — see `Room::pending_host_transfer_candidate` and
// `server::room_service`'s reconnection-driven transfer logic. This is a
// deliberate generalization, not a silent copy: see DESIGN.md.

/// A word the participant has submitted this round, with all scoring
/// metadata needed to recompute final scores at end-of-round (§3 WordDetail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordDetail {
    /// Normalized (lowercase, trimmed) form of the candidate.
    pub word: String,
    /// Score credited so far (0 if not yet validated).
    pub score_so_far: u32,
    /// Combo bonus computed from `combo_level` at submission time.
    pub combo_bonus: u32,
    /// Combo level claimed by the client at submission time (clamped server-side).
    pub combo_level: u8,
    /// `None` while awaiting host adjudication; `Some(true/false)` once resolved.
    pub validated: Option<bool>,
    /// True if dictionary lookup (or the solo-host AI shortcut) validated this word
    /// without host intervention.
    pub auto_validated: bool,
    /// Set during end-of-round duplicate detection across participants.
    pub is_duplicate: bool,
    /// True if the AI oracle, rather than the dictionary, supplied the verdict.
    pub ai_verified: bool,
}

/// A participant's membership record (§3 ParticipantRecord).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub name: String,
    pub avatar: Option<String>,
    pub is_host: bool,
    /// `None` while disconnected within the grace period.
    pub connection_id: Option<ConnectionId>,
    pub auth_user_id: Option<AuthUserId>,
    pub guest_token_hash: Option<String>,
    pub joined_at: DateTime<Utc>,
    pub disconnected: bool,
    pub disconnected_at: Option<DateTime<Utc>>,
    pub presence_status: PresenceStatus,
    pub missed_heartbeats: u32,
}

impl ParticipantRecord {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        avatar: Option<String>,
        is_host: bool,
        connection_id: ConnectionId,
        auth_user_id: Option<AuthUserId>,
        guest_token_hash: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            avatar,
            is_host,
            connection_id: Some(connection_id),
            auth_user_id,
            guest_token_hash,
            joined_at: Utc::now(),
            disconnected: false,
            disconnected_at: None,
            presence_status: PresenceStatus::Active,
            missed_heartbeats: 0,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.disconnected
    }
}

/// Acknowledgment gate between a host's `startGame` broadcast and the first
/// tick (§3 GameStartBarrier, §4.6 Start barrier).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStartBarrier {
    pub message_id: String,
    pub expected: HashSet<String>,
    pub acknowledged: HashSet<String>,
    pub deadline: DateTime<Utc>,
}

impl GameStartBarrier {
    #[must_use]
    pub fn new(message_id: impl Into<String>, expected: HashSet<String>, deadline_secs: i64) -> Self {
        Self {
            message_id: message_id.into(),
            expected,
            acknowledged: HashSet::new(),
            deadline: Utc::now() + chrono::Duration::seconds(deadline_secs),
        }
    }

    /// Records an acknowledgment; returns `true` if it was new (idempotence, §8).
    pub fn acknowledge(&mut self, message_id: &str, participant: &str) -> bool {
        if message_id != self.message_id {
            return false;
        }
        self.acknowledged.insert(participant.to_string())
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.expected.is_subset(&self.acknowledged) || Utc::now() >= self.deadline
    }
}

/// Room aggregate: one entry per live game code (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub code: RoomCode,
    pub room_name: String,
    pub language: GameLanguage,
    pub is_ranked: bool,
    pub allow_late_join: bool,
    pub game_state: GameState,

    pub grid: Vec<Vec<GridCell>>,
    /// letter -> cell coordinates, rebuilt whenever `grid` changes.
    #[serde(skip)]
    pub positions_index: HashMap<GridCell, Vec<(usize, usize)>>,

    /// Participants ordered by join time (iteration order of insertion).
    pub participants: HashMap<String, ParticipantRecord>,
    pub join_order: Vec<String>,

    pub host: Option<String>,
    pub host_connection_id: Option<ConnectionId>,

    pub scores: HashMap<String, u32>,
    pub submitted_words: HashMap<String, Vec<String>>,
    pub word_details: HashMap<String, Vec<WordDetail>>,
    pub combo: HashMap<String, u8>,
    pub achievements_awarded: HashMap<String, HashSet<String>>,
    /// Timing-based achievements survive `resetRoom` (§4.7); tracked separately
    /// so `resetRoom` can clear the rest while preserving these.
    pub timing_achievements: HashMap<String, HashSet<String>>,

    pub min_word_length: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub duration_secs: u32,
    pub remaining_seconds: u32,

    pub tournament_id: Option<String>,
    pub validation_deadline: Option<DateTime<Utc>>,

    pub start_barrier: Option<GameStartBarrier>,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,

    pub max_players: u8,
}

impl Room {
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        room_name: impl Into<String>,
        language: GameLanguage,
        is_ranked: bool,
        allow_late_join: bool,
        max_players: u8,
    ) -> Self {
        let now = Utc::now();
        Self {
            code: code.into(),
            room_name: room_name.into(),
            language,
            is_ranked,
            allow_late_join,
            game_state: GameState::Waiting,
            grid: Vec::new(),
            positions_index: HashMap::new(),
            participants: HashMap::new(),
            join_order: Vec::new(),
            host: None,
            host_connection_id: None,
            scores: HashMap::new(),
            submitted_words: HashMap::new(),
            word_details: HashMap::new(),
            combo: HashMap::new(),
            achievements_awarded: HashMap::new(),
            timing_achievements: HashMap::new(),
            min_word_length: 3,
            started_at: None,
            ends_at: None,
            duration_secs: 0,
            remaining_seconds: 0,
            tournament_id: None,
            validation_deadline: None,
            start_barrier: None,
            last_activity_at: now,
            created_at: now,
            max_players,
        }
    }

    pub fn update_activity(&mut self) {
        self.last_activity_at = Utc::now();
    }

    /// Sweeper predicate (§4.3): empty rooms expire after `empty_timeout`;
    /// rooms with participants expire after `inactive_timeout` of no activity.
    #[must_use]
    pub fn is_expired(&self, empty_timeout: chrono::Duration, inactive_timeout: chrono::Duration) -> bool {
        let idle = Utc::now() - self.last_activity_at;
        if self.active_participant_count() == 0 {
            idle > empty_timeout
        } else {
            idle > inactive_timeout
        }
    }

    #[must_use]
    pub fn active_participant_count(&self) -> usize {
        self.participants.values().filter(|p| p.is_active()).count()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.active_participant_count() as u8 >= self.max_players
    }

    /// Adds a brand-new participant; caller has already checked for name
    /// collisions and room capacity.
    pub fn add_participant(&mut self, record: ParticipantRecord) {
        let is_host = record.is_host;
        let conn = record.connection_id;
        let name = record.name.clone();
        self.join_order.push(name.clone());
        if is_host {
            self.host = Some(name.clone());
            self.host_connection_id = conn;
        }
        self.scores.entry(name.clone()).or_insert(0);
        self.submitted_words.entry(name.clone()).or_default();
        self.word_details.entry(name.clone()).or_default();
        self.combo.entry(name.clone()).or_insert(0);
        self.achievements_awarded.entry(name.clone()).or_default();
        self.timing_achievements.entry(name.clone()).or_default();
        self.participants.insert(name, record);
        self.update_activity();
    }

    /// Removes a participant entirely (§4.8 expiry cleanup / leaveRoom). Does
    /// NOT perform host hand-off; that is the reconnection controller's job.
    pub fn remove_participant(&mut self, name: &str) -> Option<ParticipantRecord> {
        self.join_order.retain(|n| n != name);
        let record = self.participants.remove(name);
        self.update_activity();
        record
    }

    /// Ordered list of currently active (non-disconnected) participant names,
    /// earliest `joinedAt` first — used by host hand-off selection (§4.8, §8).
    #[must_use]
    pub fn active_participants_by_join_order(&self) -> Vec<&str> {
        let mut active: Vec<&str> = self
            .join_order
            .iter()
            .filter(|name| {
                self.participants
                    .get(name.as_str())
                    .is_some_and(ParticipantRecord::is_active)
            })
            .map(String::as_str)
            .collect();
        active.sort_by_key(|name| self.participants[*name].joined_at);
        active
    }

    pub fn rebuild_positions_index(&mut self) {
        let mut index: HashMap<GridCell, Vec<(usize, usize)>> = HashMap::new();
        for (row_idx, row) in self.grid.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                index
                    .entry(cell.to_ascii_lowercase())
                    .or_default()
                    .push((row_idx, col_idx));
            }
        }
        self.positions_index = index;
    }

    /// Resets round-scoped state for `resetRoom` (§4.1, §8): scores, submitted
    /// words, word details, combo, and achievements (except timing-based) are
    /// cleared; host and participants are preserved.
    pub fn reset_round(&mut self) {
        for name in self.join_order.clone() {
            self.scores.insert(name.clone(), 0);
            self.submitted_words.insert(name.clone(), Vec::new());
            self.word_details.insert(name.clone(), Vec::new());
            self.combo.insert(name.clone(), 0);
            let preserved = self.timing_achievements.get(&name).cloned().unwrap_or_default();
            self.achievements_awarded.insert(name, preserved);
        }
        self.game_state = GameState::Waiting;
        self.grid.clear();
        self.positions_index.clear();
        self.started_at = None;
        self.ends_at = None;
        self.duration_secs = 0;
        self.remaining_seconds = 0;
        self.validation_deadline = None;
        self.start_barrier = None;
        self.update_activity();
    }
}
