//! Inbound message handlers (§4.1, §4.5-§4.7): room lifecycle, the word
//! submission pipeline, and round control. Each handler locks at most one
//! room for the span of its mutation and releases it before awaiting any
//! collaborator that doesn't need the lock (board tracing, dictionary
//! lookup), so a slow lookup never blocks the rest of the room.
//!
//! Grounded on the predecessor's `room_service.rs` (one inherent impl block
//! per concern, `tracing` spans around each operation, `Arc<ServerMessage>`
//! sent through `message_coordinator`) generalized from a game-agnostic
//! lobby/authority model into this protocol's room/host/word-submission
//! shape.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::coordination::dedup::DedupCacheKey;
use crate::coordination::MessageCoordinator;
use crate::distributed::LockHandle;
use crate::game::achievements;
use crate::game::scoring::word_score;
use crate::protocol::room_state::WordDetail;
use crate::protocol::types::{GameLanguage, GameState};
use crate::coordination::round_coordinator::RoomHandle;
use crate::protocol::validation::{
    normalize_candidate, validate_candidate_length, validate_participant_name_uniqueness,
    validate_participant_name_with_config, validate_room_code_with_config,
};
use crate::protocol::{
    ActiveRoomSummary, ConnectionId, ErrorCode, GridCell, JoinedPayload, ParticipantRecord,
    ParticipantSummary, Room, RoomCode, ServerMessage, WordOutcomePayload,
};
use crate::reconnection::TakeoverKind;

use super::LexiclashServer;

const ROOM_CODE_GENERATION_ATTEMPTS: u32 = 10;

/// TTL given to the distributed lock guarding a single room mutation (§5).
/// Generous relative to an in-process handler's lifetime; a held lock past
/// this is assumed abandoned and is reclaimed by the next acquirer.
const ROOM_MUTATION_LOCK_TTL: Duration = Duration::from_secs(5);

impl LexiclashServer {
    pub(crate) async fn send_error(&self, connection_id: ConnectionId, code: ErrorCode, message: impl Into<String>) {
        let message = message.into();
        let _ = self
            .send_to_connection(
                &connection_id,
                Arc::new(ServerMessage::Error { code, message }),
            )
            .await;
    }

    pub(crate) fn room_handle(&self, code: &RoomCode) -> Option<RoomHandle> {
        self.rooms.get(code).map(|entry| entry.value().clone())
    }

    /// Acquires the cross-instance room lock (§5: "any handler that mutates
    /// persisted room state acquires the distributed lock before acquiring
    /// the local lock"). Must be released via `release_room_lock` in the
    /// reverse order: local lock dropped first, then this.
    async fn acquire_room_lock(&self, connection_id: ConnectionId, room_code: &RoomCode) -> Option<LockHandle> {
        match self.lock.acquire(&format!("room:{room_code}"), ROOM_MUTATION_LOCK_TTL).await {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(room_code = %room_code, error = %err, "failed to acquire distributed room lock");
                self.send_error(connection_id, ErrorCode::ServiceUnavailable, "room is busy, try again").await;
                None
            }
        }
    }

    async fn release_room_lock(&self, handle: LockHandle) {
        if let Err(err) = self.lock.release(&handle).await {
            warn!(key = %handle.key, error = %err, "failed to release distributed room lock");
        }
    }

    fn participant_summaries(room: &Room) -> Vec<ParticipantSummary> {
        room.join_order
            .iter()
            .filter_map(|name| room.participants.get(name))
            .map(|record| ParticipantSummary {
                name: record.name.clone(),
                avatar: record.avatar.clone(),
                is_host: record.is_host,
                score: room.scores.get(&record.name).copied().unwrap_or(0),
                disconnected: record.disconnected,
                presence_status: record.presence_status,
            })
            .collect()
    }

    /// Generates a fresh room code, retrying on the rare collision against a
    /// currently live room (§4.3).
    fn generate_unique_room_code(&self) -> Option<RoomCode> {
        for _ in 0..ROOM_CODE_GENERATION_ATTEMPTS {
            let candidate = crate::protocol::room_codes::generate_room_code_with_config(&self.config.protocol);
            if !self.rooms.contains_key(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Classifies and, if necessary, enacts a multi-tab takeover for an
    /// authenticated user establishing a new session (§4.8). A prior session
    /// in a different room or on a different socket is tagged migrating and
    /// told `sessionTakenOver`; the dispatcher drops any in-flight handler
    /// result for that old connection rather than committing it.
    async fn apply_takeover(
        &self,
        auth_user_id: &str,
        new_room_code: &RoomCode,
        new_connection_id: ConnectionId,
    ) -> TakeoverKind {
        let existing = self
            .connections
            .session_for_auth_user(&auth_user_id.to_string())
            .map(|(rp, conn, _)| (rp.0, conn));

        let kind = crate::reconnection::classify_takeover(
            existing.as_ref().map(|(room, conn)| (room, *conn)),
            new_room_code,
            new_connection_id,
        );

        if let Some((old_room_code, old_connection_id)) = existing {
            match &kind {
                TakeoverKind::SameRoomDifferentSocket { .. } | TakeoverKind::DifferentRoom { .. } => {
                    self.connections.mark_migrating(&old_connection_id);
                    let _ = self
                        .send_to_connection(
                            &old_connection_id,
                            Arc::new(ServerMessage::SessionTakenOver {
                                game_code: new_room_code.clone(),
                            }),
                        )
                        .await;
                    self.connections.remove(&old_connection_id);
                    if old_room_code != *new_room_code {
                        if let Some(room_handle) = self.room_handle(&old_room_code) {
                            let mut guard = room_handle.lock().await;
                            if let Some(name) = guard
                                .participants
                                .values()
                                .find(|p| p.auth_user_id.as_deref() == Some(auth_user_id))
                                .map(|p| p.name.clone())
                            {
                                if let Some(record) = guard.participants.get_mut(&name) {
                                    record.disconnected = true;
                                    record.disconnected_at = Some(chrono::Utc::now());
                                }
                            }
                        }
                    }
                }
                TakeoverKind::None | TakeoverKind::IdempotentSameSocket => {}
            }
        }

        kind
    }

    pub(crate) async fn persist_room(&self, code: &RoomCode, room: &Room) {
        if let Err(err) = self.persistence.save_room(code, room).await {
            warn!(room_code = %code, error = %err, "failed to mirror room state");
        }
    }

    // ------------------------------------------------------------------
    // Room lifecycle
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn handle_create_game(
        self: &Arc<Self>,
        connection_id: ConnectionId,
        code: String,
        host_name: String,
        language: GameLanguage,
        is_ranked: bool,
        avatar: Option<String>,
        auth_user_id: Option<String>,
        guest_token_hash: Option<String>,
    ) -> Result<()> {
        if let Err(err) = self.rate_limiter.check_room_creation(connection_id).await {
            self.send_error(connection_id, ErrorCode::RateLimitExceeded, err.to_string()).await;
            return Ok(());
        }

        if let Err(reason) = validate_participant_name_with_config(&host_name, &self.config.protocol) {
            self.send_error(connection_id, ErrorCode::InvalidParticipantName, reason).await;
            return Ok(());
        }

        let room_code = if code.trim().is_empty() {
            match self.generate_unique_room_code() {
                Some(code) => code,
                None => {
                    self.metrics.increment_room_creation_failures();
                    self.send_error(connection_id, ErrorCode::RoomCreationFailed, "could not allocate a room code").await;
                    return Ok(());
                }
            }
        } else {
            if let Err(reason) = validate_room_code_with_config(&code, &self.config.protocol) {
                self.send_error(connection_id, ErrorCode::InvalidRoomCode, reason).await;
                return Ok(());
            }
            let candidate = code.to_uppercase();
            if self.rooms.contains_key(&candidate) {
                self.send_error(connection_id, ErrorCode::CodeInUse, "room code already in use").await;
                return Ok(());
            }
            candidate
        };

        if let Some(auth_user_id) = &auth_user_id {
            self.apply_takeover(auth_user_id, &room_code, connection_id).await;
        }

        let Some(lock_handle) = self.acquire_room_lock(connection_id, &room_code).await else {
            return Ok(());
        };

        let mut room = Room::new(
            room_code.clone(),
            format!("{host_name}'s Room"),
            language,
            is_ranked,
            true,
            self.config.server.default_max_players,
        );
        room.add_participant(ParticipantRecord::new(
            host_name.clone(),
            avatar,
            true,
            connection_id,
            auth_user_id.clone(),
            guest_token_hash,
        ));

        self.connections
            .assign_room_participant(connection_id, room_code.clone(), host_name.clone(), auth_user_id, true);

        self.persist_room(&room_code, &room).await;
        self.metrics.increment_rooms_created();
        self.metrics.increment_players_joined();

        let payload = JoinedPayload {
            code: room.code.clone(),
            room_name: room.room_name.clone(),
            language: room.language,
            game_state: room.game_state,
            is_host: true,
            reconnected: false,
            users: Self::participant_summaries(&room),
            grid: None,
            remaining_seconds: None,
        };

        self.rooms.insert(room_code.clone(), Arc::new(tokio::sync::Mutex::new(room)));
        self.release_room_lock(lock_handle).await;

        info!(room_code = %room_code, host = %host_name, "room created");

        self.send_to_connection(&connection_id, Arc::new(ServerMessage::Joined(Box::new(payload))))
            .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn handle_join(
        self: &Arc<Self>,
        connection_id: ConnectionId,
        code: String,
        name: String,
        avatar: Option<String>,
        auth_user_id: Option<String>,
        guest_token_hash: Option<String>,
    ) -> Result<()> {
        let room_code = code.to_uppercase();
        let Some(room_handle) = self.room_handle(&room_code) else {
            self.metrics.increment_room_join_failures();
            self.send_error(connection_id, ErrorCode::RoomNotFound, "no room with that code").await;
            return Ok(());
        };

        if let Err(reason) = validate_participant_name_with_config(&name, &self.config.protocol) {
            self.send_error(connection_id, ErrorCode::InvalidParticipantName, reason).await;
            return Ok(());
        }

        if let Some(auth_user_id) = &auth_user_id {
            self.apply_takeover(auth_user_id, &room_code, connection_id).await;
        }

        let Some(lock_handle) = self.acquire_room_lock(connection_id, &room_code).await else {
            return Ok(());
        };
        let mut guard = room_handle.lock().await;

        // Reconnection: a disconnected participant of the same name resumes
        // their seat rather than being treated as a brand-new join (§4.8).
        if let Some(existing) = guard.participants.get(&name).cloned() {
            if !existing.disconnected {
                self.metrics.increment_room_join_failures();
                drop(guard);
                self.release_room_lock(lock_handle).await;
                self.send_error(connection_id, ErrorCode::AlreadyInRoom, "that name is already active in this room").await;
                return Ok(());
            }

            let is_host = existing.is_host;
            if let Some(record) = guard.participants.get_mut(&name) {
                record.disconnected = false;
                record.disconnected_at = None;
                record.connection_id = Some(connection_id);
                record.missed_heartbeats = 0;
            }
            if is_host {
                guard.host_connection_id = Some(connection_id);
                self.reconnection.cancel_host_disconnect(&room_code).await;
            } else {
                self.reconnection.cancel_player_disconnect(&room_code, &name).await;
            }
            guard.update_activity();

            self.connections.assign_room_participant(connection_id, room_code.clone(), name.clone(), auth_user_id, is_host);

            let payload = JoinedPayload {
                code: guard.code.clone(),
                room_name: guard.room_name.clone(),
                language: guard.language,
                game_state: guard.game_state,
                is_host,
                reconnected: true,
                users: Self::participant_summaries(&guard),
                grid: (guard.game_state == GameState::InProgress).then(|| guard.grid.clone()),
                remaining_seconds: (guard.game_state == GameState::InProgress).then_some(guard.remaining_seconds),
            };
            let snapshot = guard.clone();
            drop(guard);
            self.release_room_lock(lock_handle).await;

            self.persist_room(&room_code, &snapshot).await;
            info!(room_code = %room_code, participant = %name, "participant reconnected");

            self.send_to_connection(&connection_id, Arc::new(ServerMessage::Joined(Box::new(payload)))).await?;
            let _ = self
                .broadcast_to_room_except(
                    &room_code,
                    &connection_id,
                    Arc::new(crate::reconnection::player_reconnected_message(name)),
                )
                .await;
            return Ok(());
        }

        if guard.game_state != GameState::Waiting && !guard.allow_late_join {
            self.metrics.increment_room_join_failures();
            drop(guard);
            self.release_room_lock(lock_handle).await;
            self.send_error(connection_id, ErrorCode::LateJoinBlocked, "this room is not accepting new players mid-round").await;
            return Ok(());
        }

        if let Err(reason) = validate_participant_name_uniqueness(&name, &guard.participants) {
            self.metrics.increment_room_join_failures();
            drop(guard);
            self.release_room_lock(lock_handle).await;
            self.send_error(connection_id, ErrorCode::InvalidParticipantName, reason).await;
            return Ok(());
        }

        if guard.is_full() {
            self.metrics.increment_room_join_failures();
            drop(guard);
            self.release_room_lock(lock_handle).await;
            self.send_error(connection_id, ErrorCode::RoomFull, "room is at capacity").await;
            return Ok(());
        }

        guard.add_participant(ParticipantRecord::new(
            name.clone(),
            avatar,
            false,
            connection_id,
            auth_user_id.clone(),
            guest_token_hash,
        ));
        self.connections
            .assign_room_participant(connection_id, room_code.clone(), name.clone(), auth_user_id, false);

        let payload = JoinedPayload {
            code: guard.code.clone(),
            room_name: guard.room_name.clone(),
            language: guard.language,
            game_state: guard.game_state,
            is_host: false,
            reconnected: false,
            users: Self::participant_summaries(&guard),
            grid: (guard.game_state == GameState::InProgress).then(|| guard.grid.clone()),
            remaining_seconds: (guard.game_state == GameState::InProgress).then_some(guard.remaining_seconds),
        };
        let users = payload.users.clone();
        let snapshot = guard.clone();
        drop(guard);
        self.release_room_lock(lock_handle).await;

        self.persist_room(&room_code, &snapshot).await;
        self.metrics.increment_rooms_joined();
        self.metrics.increment_players_joined();
        info!(room_code = %room_code, participant = %name, "participant joined");

        self.send_to_connection(&connection_id, Arc::new(ServerMessage::Joined(Box::new(payload)))).await?;
        let _ = self
            .broadcast_to_room_except(&room_code, &connection_id, Arc::new(ServerMessage::UpdateUsers { users }))
            .await;
        Ok(())
    }

    pub async fn handle_leave_room(self: &Arc<Self>, connection_id: ConnectionId) -> Result<()> {
        let Some((room_code, name)) = self.connections.room_participant_for(&connection_id) else {
            return Ok(());
        };
        let Some(room_handle) = self.room_handle(&room_code) else {
            self.connections.clear_room_participant(&connection_id);
            return Ok(());
        };

        let Some(lock_handle) = self.acquire_room_lock(connection_id, &room_code).await else {
            return Ok(());
        };
        let mut guard = room_handle.lock().await;
        let Some(record) = guard.participants.get(&name).cloned() else {
            drop(guard);
            self.release_room_lock(lock_handle).await;
            self.connections.clear_room_participant(&connection_id);
            return Ok(());
        };

        self.connections.clear_room_participant(&connection_id);
        self.reconnection.cancel_player_disconnect(&room_code, &name).await;
        self.reconnection.cancel_host_disconnect(&room_code).await;

        if record.is_host {
            match crate::reconnection::select_handoff_host(&guard) {
                Some(new_host) => {
                    guard.remove_participant(&name);
                    let new_host_connection_id = guard.participants.get_mut(&new_host).map(|record| {
                        record.is_host = true;
                        record.connection_id
                    });
                    if let Some(connection_id) = new_host_connection_id {
                        guard.host = Some(new_host.clone());
                        guard.host_connection_id = connection_id;
                    }
                    guard.update_activity();
                    let snapshot = guard.clone();
                    drop(guard);
                    self.persist_room(&room_code, &snapshot).await;
                    self.metrics.increment_players_left();
                    let _ = self
                        .broadcast_to_room(&room_code, Arc::new(crate::reconnection::player_left_message(name)))
                        .await;
                    self.broadcast_to_room(&room_code, Arc::new(crate::reconnection::host_transferred_message(new_host))).await?;
                }
                None => {
                    self.rooms.remove(&room_code);
                    drop(guard);
                    self.round_coordinator.cancel(&room_code).await;
                    self.reconnection.cancel_room(&room_code).await;
                    let _ = self.persistence.delete_room(&room_code).await;
                    self.broadcast_to_room(&room_code, Arc::new(ServerMessage::HostLeftRoomClosing)).await?;
                }
            }
        } else {
            guard.remove_participant(&name);
            guard.update_activity();
            let snapshot = guard.clone();
            drop(guard);
            self.persist_room(&room_code, &snapshot).await;
            self.metrics.increment_players_left();
            self.broadcast_to_room(&room_code, Arc::new(crate::reconnection::player_left_message(name))).await?;
        }

        self.release_room_lock(lock_handle).await;
        Ok(())
    }

    pub async fn handle_close_room(self: &Arc<Self>, connection_id: ConnectionId) -> Result<()> {
        let Some((room_code, name)) = self.connections.room_participant_for(&connection_id) else {
            return Ok(());
        };
        let Some(room_handle) = self.room_handle(&room_code) else {
            return Ok(());
        };

        let is_host = {
            let guard = room_handle.lock().await;
            guard.participants.get(&name).is_some_and(|p| p.is_host)
        };
        if !is_host {
            self.send_error(connection_id, ErrorCode::OnlyHostCanEnd, "only the host can close the room").await;
            return Ok(());
        }

        let Some(lock_handle) = self.acquire_room_lock(connection_id, &room_code).await else {
            return Ok(());
        };

        self.rooms.remove(&room_code);
        self.round_coordinator.cancel(&room_code).await;
        self.reconnection.cancel_room(&room_code).await;
        let _ = self.persistence.delete_room(&room_code).await;
        self.release_room_lock(lock_handle).await;

        for connection in self.connections.connections_in_room(&room_code) {
            self.connections.clear_room_participant(&connection);
        }

        info!(room_code = %room_code, "room closed by host");
        self.broadcast_to_room(&room_code, Arc::new(ServerMessage::HostLeftRoomClosing)).await?;
        Ok(())
    }

    pub async fn handle_get_active_rooms(self: &Arc<Self>, connection_id: ConnectionId) -> Result<()> {
        let mut rooms = Vec::with_capacity(self.rooms.len());
        for entry in self.rooms.iter() {
            let guard = entry.value().lock().await;
            rooms.push(ActiveRoomSummary {
                code: guard.code.clone(),
                room_name: guard.room_name.clone(),
                participant_count: guard.active_participant_count() as u8,
                max_players: guard.max_players,
                game_state: guard.game_state,
            });
        }
        self.send_to_connection(&connection_id, Arc::new(ServerMessage::ActiveRooms { rooms })).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Round control
    // ------------------------------------------------------------------

    pub async fn handle_start_game(
        self: &Arc<Self>,
        connection_id: ConnectionId,
        grid: Vec<Vec<GridCell>>,
        seconds: u32,
        min_word_length: usize,
    ) -> Result<()> {
        let Some((room_code, name)) = self.connections.room_participant_for(&connection_id) else {
            self.send_error(connection_id, ErrorCode::NotInRoom, "not in a room").await;
            return Ok(());
        };
        let Some(room_handle) = self.room_handle(&room_code) else {
            return Ok(());
        };

        let Some(lock_handle) = self.acquire_room_lock(connection_id, &room_code).await else {
            return Ok(());
        };

        let (language, expected_participants, min_word_length) = {
            let guard = room_handle.lock().await;
            if guard.participants.get(&name).is_none_or(|p| !p.is_host) {
                drop(guard);
                self.release_room_lock(lock_handle).await;
                self.send_error(connection_id, ErrorCode::OnlyHostCanStart, "only the host can start the round").await;
                return Ok(());
            }
            if guard.game_state != GameState::Waiting {
                drop(guard);
                self.release_room_lock(lock_handle).await;
                self.send_error(connection_id, ErrorCode::InvalidRoomState, "a round is already in progress").await;
                return Ok(());
            }
            let expected: HashSet<String> = guard.active_participants_by_join_order().into_iter().map(String::from).collect();
            let min_word_length = min_word_length.max(crate::protocol::types::MIN_WORD_LENGTH_FLOOR);
            (guard.language, expected, min_word_length)
        };

        self.round_coordinator
            .start_round(room_code.clone(), room_handle, grid, seconds, language, min_word_length, expected_participants)
            .await?;
        self.release_room_lock(lock_handle).await;
        info!(room_code = %room_code, "round started");
        Ok(())
    }

    pub async fn handle_start_game_ack(self: &Arc<Self>, connection_id: ConnectionId, message_id: String) -> Result<()> {
        let Some((room_code, name)) = self.connections.room_participant_for(&connection_id) else {
            return Ok(());
        };

        let key = DedupCacheKey {
            room_code: Some(room_code.clone()),
            sequence_id: LexiclashServer::hash_message_id(&message_id),
        };
        if self.dedup.check(&key).await.hit {
            return Ok(());
        }
        self.dedup.insert(key).await;

        self.round_coordinator.acknowledge_start(&room_code, &message_id, &name).await;
        Ok(())
    }

    pub async fn handle_end_game(self: &Arc<Self>, connection_id: ConnectionId) -> Result<()> {
        let Some((room_code, name)) = self.connections.room_participant_for(&connection_id) else {
            return Ok(());
        };
        let Some(room_handle) = self.room_handle(&room_code) else {
            return Ok(());
        };

        let Some(lock_handle) = self.acquire_room_lock(connection_id, &room_code).await else {
            return Ok(());
        };

        {
            let guard = room_handle.lock().await;
            if guard.participants.get(&name).is_none_or(|p| !p.is_host) {
                drop(guard);
                self.release_room_lock(lock_handle).await;
                self.send_error(connection_id, ErrorCode::OnlyHostCanEnd, "only the host can end the round").await;
                return Ok(());
            }
            if guard.game_state != GameState::InProgress {
                drop(guard);
                self.release_room_lock(lock_handle).await;
                self.send_error(connection_id, ErrorCode::GameNotInProgress, "no round in progress").await;
                return Ok(());
            }
        }

        // `end_round` manages its own room-lock acquisition internally and
        // drops it around the AI oracle call (§5), so the distributed lock
        // is released here rather than spanning the whole call. It also
        // retires this room's tick/barrier bookkeeping itself; a pending
        // validation deadline task (deferred outcome) is left running.
        let outcome = self.round_coordinator.end_round(&room_code, room_handle).await;
        self.release_room_lock(lock_handle).await;

        self.broadcast_to_room(&room_code, Arc::new(ServerMessage::EndGame)).await?;
        if let Some(message) = outcome.message {
            self.broadcast_to_room(&room_code, Arc::new(message)).await?;
        }
        Ok(())
    }

    pub async fn handle_reset_game(self: &Arc<Self>, connection_id: ConnectionId) -> Result<()> {
        let Some((room_code, name)) = self.connections.room_participant_for(&connection_id) else {
            return Ok(());
        };
        let Some(room_handle) = self.room_handle(&room_code) else {
            return Ok(());
        };

        let Some(lock_handle) = self.acquire_room_lock(connection_id, &room_code).await else {
            return Ok(());
        };

        let users = {
            let mut guard = room_handle.lock().await;
            if guard.participants.get(&name).is_none_or(|p| !p.is_host) {
                drop(guard);
                self.release_room_lock(lock_handle).await;
                self.send_error(connection_id, ErrorCode::OnlyHostCanStart, "only the host can reset the room").await;
                return Ok(());
            }
            guard.reset_round();
            Self::participant_summaries(&guard)
        };
        self.release_room_lock(lock_handle).await;

        self.round_coordinator.cancel(&room_code).await;
        self.broadcast_to_room(&room_code, Arc::new(ServerMessage::UpdateUsers { users })).await?;
        Ok(())
    }

    pub async fn handle_validate_words(self: &Arc<Self>, connection_id: ConnectionId, approved_words: Vec<String>) -> Result<()> {
        let Some((room_code, name)) = self.connections.room_participant_for(&connection_id) else {
            return Ok(());
        };
        let Some(room_handle) = self.room_handle(&room_code) else {
            return Ok(());
        };

        let approved: HashSet<String> = approved_words.into_iter().map(|w| normalize_candidate(&w)).collect();

        let Some(lock_handle) = self.acquire_room_lock(connection_id, &room_code).await else {
            return Ok(());
        };

        let outcome = {
            let mut guard = room_handle.lock().await;
            if guard.participants.get(&name).is_none_or(|p| !p.is_host) {
                drop(guard);
                self.release_room_lock(lock_handle).await;
                self.send_error(connection_id, ErrorCode::OnlyHostCanEnd, "only the host can validate words").await;
                return Ok(());
            }

            self.round_coordinator
                .finalize_validation(&room_code, &mut guard, &approved)
                .await
        };
        self.release_room_lock(lock_handle).await;

        if let Some(message) = outcome.message {
            self.broadcast_to_room(&room_code, Arc::new(message)).await?;
        }
        self.broadcast_to_room(&room_code, Arc::new(ServerMessage::ValidationComplete)).await?;
        Ok(())
    }

    pub async fn handle_submit_word_vote(self: &Arc<Self>, connection_id: ConnectionId, word: String, approve: bool) -> Result<()> {
        let Some((room_code, name)) = self.connections.room_participant_for(&connection_id) else {
            return Ok(());
        };
        let Some(room_handle) = self.room_handle(&room_code) else {
            return Ok(());
        };
        let normalized = normalize_candidate(&word);

        let Some(lock_handle) = self.acquire_room_lock(connection_id, &room_code).await else {
            return Ok(());
        };

        let message = {
            let mut guard = room_handle.lock().await;
            if guard.participants.get(&name).is_none_or(|p| !p.is_host) {
                drop(guard);
                self.release_room_lock(lock_handle).await;
                self.send_error(connection_id, ErrorCode::OnlyHostCanEnd, "only the host can adjudicate words").await;
                return Ok(());
            }

            for details in guard.word_details.values_mut() {
                for detail in details.iter_mut() {
                    if detail.word == normalized && detail.validated.is_none() {
                        detail.validated = Some(approve);
                        detail.score_so_far = if approve {
                            word_score(detail.word.chars().count(), detail.combo_level)
                        } else {
                            0
                        };
                    }
                }
            }
            let totals: Vec<(String, u32)> = guard
                .word_details
                .iter()
                .map(|(participant, details)| (participant.clone(), details.iter().map(|d| d.score_so_far).sum()))
                .collect();
            for (participant, total) in totals {
                guard.scores.insert(participant, total);
            }

            ServerMessage::UpdateLeaderboard {
                scores: guard.scores.clone().into_iter().collect(),
            }
        };
        self.release_room_lock(lock_handle).await;

        self.broadcast_to_room(&room_code, Arc::new(message)).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Word submission (§4.5)
    // ------------------------------------------------------------------

    pub async fn handle_submit_word(self: &Arc<Self>, connection_id: ConnectionId, candidate: String, combo_level: u8) -> Result<()> {
        let Some((room_code, name)) = self.connections.room_participant_for(&connection_id) else {
            return Ok(());
        };
        let Some(room_handle) = self.room_handle(&room_code) else {
            return Ok(());
        };

        let normalized = normalize_candidate(&candidate);

        // Step 1-4: snapshot what's needed for the pure checks, then release
        // the lock before the board trace, dictionary lookup, and (solo-host
        // shortcut) AI oracle call (§5).
        let (min_word_length, grid, positions_index, already_found, language, solo_host) = {
            let guard = room_handle.lock().await;
            if guard.game_state != GameState::InProgress {
                self.send_error(connection_id, ErrorCode::GameNotInProgress, "no round in progress").await;
                return Ok(());
            }
            let already_found = guard
                .submitted_words
                .get(&name)
                .is_some_and(|words| words.contains(&normalized));
            let solo_host = guard.active_participant_count() == 1;
            (guard.min_word_length, guard.grid.clone(), guard.positions_index.clone(), already_found, guard.language, solo_host)
        };

        if validate_candidate_length(&normalized, min_word_length).is_err() {
            let _ = self
                .send_to_connection(
                    &connection_id,
                    Arc::new(ServerMessage::WordTooShort { word: normalized, min_word_length }),
                )
                .await;
            return Ok(());
        }

        if self.profanity.is_blocked(&normalized) {
            let _ = self
                .send_to_connection(&connection_id, Arc::new(ServerMessage::WordRejected { word: normalized, reason: "inappropriate word".to_string() }))
                .await;
            return Ok(());
        }

        if already_found {
            let _ = self.send_to_connection(&connection_id, Arc::new(ServerMessage::WordAlreadyFound { word: normalized })).await;
            return Ok(());
        }

        if !self.board_validator.is_on_board(normalized.clone(), grid, positions_index).await {
            let _ = self.send_to_connection(&connection_id, Arc::new(ServerMessage::WordNotOnBoard { word: normalized })).await;
            return Ok(());
        }

        let verdict = self.dictionary.lookup(&normalized, language).await;

        if verdict == crate::protocol::types::DictionaryVerdict::Invalid {
            let _ = self
                .send_to_connection(&connection_id, Arc::new(ServerMessage::WordRejected { word: normalized, reason: "not a recognized word".to_string() }))
                .await;
            return Ok(());
        }

        // Solo-host shortcut (§4.5): with nobody else in the room to adjudicate
        // later, a dictionary-unknown word gets an immediate AI opinion instead
        // of sitting in limbo until the host (who is also the only player)
        // would otherwise have to judge their own submission.
        let mut ai_verified = false;
        let mut auto_validated = verdict == crate::protocol::types::DictionaryVerdict::Valid;
        let mut ai_rejected = false;
        if !auto_validated && solo_host {
            self.metrics.increment_ai_oracle_calls();
            match self.ai_oracle.validate_word(&normalized, language).await {
                crate::game::AiVerdict::Valid => {
                    auto_validated = true;
                    ai_verified = true;
                }
                crate::game::AiVerdict::Invalid => {
                    ai_rejected = true;
                }
                crate::game::AiVerdict::Unavailable => {
                    ai_rejected = true;
                    self.metrics.increment_ai_oracle_timeouts();
                }
            }
        }
        let combo_level = combo_level.min(crate::protocol::types::MAX_COMBO_LEVEL);
        let score = if auto_validated { word_score(normalized.chars().count(), combo_level) } else { 0 };

        let Some(lock_handle) = self.acquire_room_lock(connection_id, &room_code).await else {
            return Ok(());
        };

        let (unlocked, leaderboard) = {
            let mut guard = room_handle.lock().await;
            guard.submitted_words.entry(name.clone()).or_default().push(normalized.clone());
            guard.word_details.entry(name.clone()).or_default().push(WordDetail {
                word: normalized.clone(),
                score_so_far: score,
                combo_bonus: crate::game::scoring::combo_bonus(combo_level),
                combo_level,
                validated: if auto_validated {
                    Some(true)
                } else if ai_rejected {
                    Some(false)
                } else {
                    None
                },
                auto_validated,
                is_duplicate: false,
                ai_verified,
            });
            if auto_validated {
                *guard.scores.entry(name.clone()).or_insert(0) += score;
                guard.combo.insert(name.clone(), combo_level);
            } else {
                guard.combo.insert(name.clone(), 0);
            }

            let unlocked = if auto_validated {
                let unlocked = achievements::live_achievements_for_submission(&guard, &name, normalized.chars().count());
                let mut newly = Vec::new();
                for key in unlocked {
                    let target = if achievements::is_timing_based(key) {
                        guard.timing_achievements.entry(name.clone()).or_default()
                    } else {
                        guard.achievements_awarded.entry(name.clone()).or_default()
                    };
                    if target.insert(key.to_string()) {
                        newly.push(key);
                    }
                }
                newly
            } else {
                Vec::new()
            };

            guard.update_activity();
            let leaderboard: Vec<(String, u32)> = guard.scores.clone().into_iter().collect();
            (unlocked, leaderboard)
        };
        self.release_room_lock(lock_handle).await;

        if auto_validated {
            self.send_to_connection(
                &connection_id,
                Arc::new(ServerMessage::WordAccepted(WordOutcomePayload {
                    word: normalized.clone(),
                    score,
                    base_score: crate::game::scoring::base_score(normalized.chars().count()),
                    combo_bonus: crate::game::scoring::combo_bonus(combo_level),
                    combo_level,
                    auto_validated: true,
                    ai_verified,
                })),
            )
            .await?;
            for achievement in unlocked {
                self.broadcast_to_room(
                    &room_code,
                    Arc::new(ServerMessage::LiveAchievementUnlocked { participant: name.clone(), achievement: achievement.to_string() }),
                )
                .await?;
            }
            self.broadcast_to_room(&room_code, Arc::new(ServerMessage::UpdateLeaderboard { scores: leaderboard })).await?;
        } else {
            self.send_to_connection(&connection_id, Arc::new(ServerMessage::WordNeedsValidation { word: normalized })).await?;
        }

        Ok(())
    }

    pub async fn handle_chat_message(self: &Arc<Self>, connection_id: ConnectionId, text: String) -> Result<()> {
        let Some((room_code, name)) = self.connections.room_participant_for(&connection_id) else {
            return Ok(());
        };
        self.broadcast_to_room(&room_code, Arc::new(ServerMessage::ChatMessage { from: name, text })).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Presence and keepalive
    // ------------------------------------------------------------------

    pub async fn handle_presence_update(self: &Arc<Self>, connection_id: ConnectionId, _focused: bool, idle: bool) -> Result<()> {
        let Some((room_code, name)) = self.connections.room_participant_for(&connection_id) else {
            return Ok(());
        };
        let Some(room_handle) = self.room_handle(&room_code) else {
            return Ok(());
        };

        let changed = {
            let mut guard = room_handle.lock().await;
            let Some(record) = guard.participants.get_mut(&name) else {
                return Ok(());
            };
            let next = if idle { crate::protocol::types::PresenceStatus::Idle } else { crate::protocol::types::PresenceStatus::Active };
            if record.presence_status == next {
                None
            } else {
                record.presence_status = next;
                record.missed_heartbeats = 0;
                Some(next)
            }
        };

        if let Some(status) = changed {
            self.broadcast_to_room(&room_code, Arc::new(ServerMessage::PlayerConnectionStatusChanged { name, status })).await?;
        }
        Ok(())
    }

    pub async fn handle_presence_heartbeat(self: &Arc<Self>, connection_id: ConnectionId) -> Result<()> {
        self.connections.record_ping(&connection_id);
        let Some((room_code, name)) = self.connections.room_participant_for(&connection_id) else {
            return Ok(());
        };
        let Some(room_handle) = self.room_handle(&room_code) else {
            return Ok(());
        };

        let changed = {
            let mut guard = room_handle.lock().await;
            let Some(record) = guard.participants.get_mut(&name) else {
                return Ok(());
            };
            let was = record.presence_status;
            record.missed_heartbeats = 0;
            crate::reconnection::sample_presence_transition(0, was, self.config.server.presence_missed_heartbeat_threshold).map(|next| {
                record.presence_status = next;
                next
            })
        };

        if let Some(status) = changed {
            self.broadcast_to_room(&room_code, Arc::new(ServerMessage::PlayerConnectionStatusChanged { name, status })).await?;
        }
        Ok(())
    }

    pub async fn handle_ping(self: &Arc<Self>, connection_id: ConnectionId) -> Result<()> {
        self.connections.record_ping(&connection_id);
        self.send_to_connection(&connection_id, Arc::new(ServerMessage::Pong)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    async fn test_server() -> Arc<LexiclashServer> {
        LexiclashServer::new(Config::default()).await.expect("server constructs")
    }

    async fn register(server: &Arc<LexiclashServer>) -> (ConnectionId, tokio::sync::mpsc::Receiver<Arc<ServerMessage>>) {
        let (tx, rx) = tokio::sync::mpsc::channel(32);
        let connection_id = ConnectionId::new_v4();
        server
            .connections
            .register(connection_id, tx, "127.0.0.1:1".parse().unwrap())
            .unwrap();
        (connection_id, rx)
    }

    #[tokio::test]
    async fn create_game_seeds_a_waiting_room_with_the_host() {
        let server = test_server().await;
        let (conn, mut rx) = register(&server).await;

        server
            .handle_create_game(conn, String::new(), "alice".to_string(), GameLanguage::En, false, None, None, None)
            .await
            .unwrap();

        let msg = rx.try_recv().expect("joined message sent");
        let ServerMessage::Joined(payload) = &*msg else { panic!("expected Joined") };
        assert!(payload.is_host);
        assert_eq!(payload.users.len(), 1);
        assert_eq!(server.rooms.len(), 1);
    }

    #[tokio::test]
    async fn join_unknown_room_reports_room_not_found() {
        let server = test_server().await;
        let (conn, mut rx) = register(&server).await;

        server.handle_join(conn, "ZZZZ".to_string(), "bob".to_string(), None, None, None).await.unwrap();

        let msg = rx.try_recv().expect("error sent");
        assert!(matches!(&*msg, ServerMessage::Error { code: ErrorCode::RoomNotFound, .. }));
    }

    #[tokio::test]
    async fn second_join_with_duplicate_name_is_rejected() {
        let server = test_server().await;
        let (host_conn, _rx1) = register(&server).await;
        server
            .handle_create_game(host_conn, "ABCD".to_string(), "alice".to_string(), GameLanguage::En, false, None, None, None)
            .await
            .unwrap();

        let (conn2, mut rx2) = register(&server).await;
        server.handle_join(conn2, "ABCD".to_string(), "alice".to_string(), None, None, None).await.unwrap();

        let msg = rx2.try_recv().expect("error sent");
        assert!(matches!(&*msg, ServerMessage::Error { code: ErrorCode::InvalidParticipantName, .. }));
    }

    #[tokio::test]
    async fn submit_word_not_on_the_board_is_rejected() {
        let server = test_server().await;
        let (host_conn, mut rx) = register(&server).await;
        server
            .handle_create_game(host_conn, "ABCD".to_string(), "alice".to_string(), GameLanguage::En, false, None, None, None)
            .await
            .unwrap();
        rx.try_recv().unwrap();

        {
            let handle = server.room_handle(&"ABCD".to_string()).unwrap();
            let mut guard = handle.lock().await;
            guard.grid = vec![vec!['c', 'a'], vec!['t', 's']];
            guard.rebuild_positions_index();
            guard.game_state = GameState::InProgress;
            guard.min_word_length = 2;
        }

        server.handle_submit_word(host_conn, "zzz".to_string(), 0).await.unwrap();
        let msg = rx.try_recv().expect("not-on-board message sent");
        assert!(matches!(&*msg, ServerMessage::WordNotOnBoard { .. }));
    }

    #[tokio::test]
    async fn submit_known_word_scores_and_broadcasts_leaderboard() {
        let server = test_server().await;
        let (host_conn, mut rx) = register(&server).await;
        server
            .handle_create_game(host_conn, "ABCD".to_string(), "alice".to_string(), GameLanguage::En, false, None, None, None)
            .await
            .unwrap();
        rx.try_recv().unwrap();

        {
            let handle = server.room_handle(&"ABCD".to_string()).unwrap();
            let mut guard = handle.lock().await;
            guard.grid = vec![vec!['c', 'a'], vec!['t', 's']];
            guard.rebuild_positions_index();
            guard.game_state = GameState::InProgress;
            guard.min_word_length = 2;
        }

        server.handle_submit_word(host_conn, "cat".to_string(), 0).await.unwrap();
        let accepted = rx.try_recv().expect("word accepted");
        assert!(matches!(&*accepted, ServerMessage::WordAccepted(_)));
    }
}
