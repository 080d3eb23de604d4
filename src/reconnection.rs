//! Reconnection Controller (§2 item 9, §4.8): host/player disconnect grace
//! periods, host hand-off selection, multi-tab takeover classification, and
//! the presence heartbeat state machine.
//!
//! Grounded on the predecessor's `ReconnectionManager` shape (a manager
//! holding cancellable per-entity timers, keyed registration/cancellation
//! calls) generalized from a single flat reconnection window into the two
//! distinct grace periods (host vs. player) and the hand-off/cleanup
//! behavior §4.8 specifies on expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::coordination::round_coordinator::RoomHandle;
use crate::coordination::MessageCoordinator;
use crate::protocol::types::PresenceStatus;
use crate::protocol::{Room, RoomCode, ServerMessage};

/// Outcome of a host-disconnect grace period expiring.
#[derive(Debug, Clone)]
pub enum HostGraceOutcome {
    /// `newHost` took over; room survives.
    HandedOff { new_host: String },
    /// No eligible participant remained; room should be torn down.
    RoomEmptied,
}

/// Outcome of a player-disconnect grace period expiring.
#[derive(Debug, Clone)]
pub struct PlayerGraceOutcome {
    pub participant: String,
}

/// How an authenticated user's new connection relates to their existing
/// session, for multi-tab takeover handling (§4.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TakeoverKind {
    /// No prior session for this auth user.
    None,
    /// Same socket reconnecting under an idempotent request; no teardown.
    IdempotentSameSocket,
    /// Already present in the same room on a different socket.
    SameRoomDifferentSocket { room_code: RoomCode },
    /// Already present in a different room.
    DifferentRoom { room_code: RoomCode },
}

/// Classifies a multi-tab takeover given the previously known connection
/// for an auth user (if any) and the room/connection of the new request.
#[must_use]
pub fn classify_takeover(
    existing: Option<(&RoomCode, crate::protocol::ConnectionId)>,
    new_room_code: &RoomCode,
    new_connection_id: crate::protocol::ConnectionId,
) -> TakeoverKind {
    match existing {
        None => TakeoverKind::None,
        Some((_, existing_conn)) if existing_conn == new_connection_id => {
            TakeoverKind::IdempotentSameSocket
        }
        Some((existing_room, _)) if existing_room == new_room_code => {
            TakeoverKind::SameRoomDifferentSocket {
                room_code: existing_room.clone(),
            }
        }
        Some((existing_room, _)) => TakeoverKind::DifferentRoom {
            room_code: existing_room.clone(),
        },
    }
}

/// Selects the hand-off host candidate on a host-grace-period expiry: the
/// longest-tenured (earliest `joinedAt`) active, non-host participant.
#[must_use]
pub fn select_handoff_host(room: &Room) -> Option<String> {
    room.active_participants_by_join_order()
        .into_iter()
        .find(|name| room.host.as_deref() != Some(*name))
        .map(String::from)
}

/// One missed-heartbeat → presence-transition step (§4.8 presence task).
/// Returns the participant's new status if it changed.
#[must_use]
pub fn sample_presence_transition(
    missed_heartbeats: u32,
    current: PresenceStatus,
    missed_threshold: u32,
) -> Option<PresenceStatus> {
    let next = if missed_heartbeats >= missed_threshold.saturating_mul(2) {
        PresenceStatus::Away
    } else if missed_heartbeats >= missed_threshold {
        PresenceStatus::Weak
    } else if missed_heartbeats > 0 {
        PresenceStatus::Idle
    } else {
        PresenceStatus::Active
    };

    if next == current {
        None
    } else {
        Some(next)
    }
}

type TimerKey = (RoomCode, Option<String>);

/// Owns the host- and player-disconnect grace-period timers and cancels
/// them on reconnect. One instance is shared across the whole server.
pub struct ReconnectionController {
    timers: Mutex<HashMap<TimerKey, JoinHandle<()>>>,
    host_grace: StdDuration,
    player_grace: StdDuration,
}

impl ReconnectionController {
    #[must_use]
    pub fn new(host_grace: StdDuration, player_grace: StdDuration) -> Self {
        Self {
            timers: Mutex::new(HashMap::new()),
            host_grace,
            player_grace,
        }
    }

    #[must_use]
    pub fn host_grace_period(&self) -> StdDuration {
        self.host_grace
    }

    #[must_use]
    pub fn player_grace_period(&self) -> StdDuration {
        self.player_grace
    }

    /// Schedules the host-disconnect grace timer. `on_expiry` runs after the
    /// hand-off (or emptying) has already been applied to `room` and must
    /// broadcast and/or request room teardown based on the returned
    /// `HostGraceOutcome`.
    pub async fn schedule_host_disconnect<F, Fut>(
        &self,
        room_code: RoomCode,
        room: RoomHandle,
        coordinator: Arc<dyn MessageCoordinator>,
        on_expiry: F,
    ) where
        F: FnOnce(HostGraceOutcome, RoomHandle, Arc<dyn MessageCoordinator>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let grace = self.host_grace;
        let key: TimerKey = (room_code, None);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let outcome = {
                let mut guard = room.lock().await;
                if !is_host_still_disconnected(&guard) {
                    return;
                }
                match select_handoff_host(&guard) {
                    Some(new_host) => {
                        apply_host_handoff(&mut guard, &new_host);
                        HostGraceOutcome::HandedOff { new_host }
                    }
                    None => HostGraceOutcome::RoomEmptied,
                }
            };
            on_expiry(outcome, room, coordinator).await;
        });

        let mut timers = self.timers.lock().await;
        if let Some(old) = timers.insert(key, handle) {
            old.abort();
        }
    }

    /// Cancels a pending host-disconnect timer (the host reconnected).
    pub async fn cancel_host_disconnect(&self, room_code: &RoomCode) {
        let key: TimerKey = (room_code.clone(), None);
        if let Some(handle) = self.timers.lock().await.remove(&key) {
            handle.abort();
        }
    }

    /// Schedules a player-disconnect grace timer.
    pub async fn schedule_player_disconnect<F, Fut>(
        &self,
        room_code: RoomCode,
        participant: String,
        room: RoomHandle,
        coordinator: Arc<dyn MessageCoordinator>,
        on_expiry: F,
    ) where
        F: FnOnce(PlayerGraceOutcome, RoomHandle, Arc<dyn MessageCoordinator>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let grace = self.player_grace;
        let key: TimerKey = (room_code, Some(participant.clone()));
        let participant_for_task = participant;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let still_disconnected = {
                let mut guard = room.lock().await;
                match guard.participants.get(&participant_for_task) {
                    Some(record) if record.disconnected => {
                        guard.remove_participant(&participant_for_task);
                        true
                    }
                    _ => false,
                }
            };
            if still_disconnected {
                on_expiry(
                    PlayerGraceOutcome {
                        participant: participant_for_task,
                    },
                    room,
                    coordinator,
                )
                .await;
            }
        });

        let mut timers = self.timers.lock().await;
        if let Some(old) = timers.insert(key, handle) {
            old.abort();
        }
    }

    /// Cancels a pending player-disconnect timer (the player reconnected).
    pub async fn cancel_player_disconnect(&self, room_code: &RoomCode, participant: &str) {
        let key: TimerKey = (room_code.clone(), Some(participant.to_string()));
        if let Some(handle) = self.timers.lock().await.remove(&key) {
            handle.abort();
        }
    }

    /// Cancels every timer owned by a room (room destroyed, reset, closed).
    pub async fn cancel_room(&self, room_code: &RoomCode) {
        let mut timers = self.timers.lock().await;
        let keys: Vec<TimerKey> = timers
            .keys()
            .filter(|(code, _)| code == room_code)
            .cloned()
            .collect();
        for key in keys {
            if let Some(handle) = timers.remove(&key) {
                handle.abort();
            }
        }
    }
}

fn is_host_still_disconnected(room: &Room) -> bool {
    room.host
        .as_ref()
        .and_then(|host| room.participants.get(host))
        .is_some_and(|record| record.disconnected)
}

fn apply_host_handoff(room: &mut Room, new_host: &str) {
    if let Some(old_host) = room.host.clone() {
        if let Some(record) = room.participants.get_mut(&old_host) {
            record.is_host = false;
        }
    }
    room.host = Some(new_host.to_string());
    room.host_connection_id = room
        .participants
        .get(new_host)
        .and_then(|record| record.connection_id);
    if let Some(record) = room.participants.get_mut(new_host) {
        record.is_host = true;
    }
    room.update_activity();
}

/// Builds the `hostDisconnected` broadcast payload.
#[must_use]
pub fn host_disconnected_message(grace_period_ms: u64) -> ServerMessage {
    ServerMessage::HostDisconnected { grace_period_ms }
}

/// Builds the `hostTransferred` broadcast payload.
#[must_use]
pub fn host_transferred_message(new_host: String) -> ServerMessage {
    ServerMessage::HostTransferred { new_host }
}

/// Builds the `playerDisconnected` broadcast payload.
#[must_use]
pub fn player_disconnected_message(participant: String) -> ServerMessage {
    ServerMessage::PlayerDisconnected { name: participant }
}

/// Builds the `playerReconnected` broadcast payload.
#[must_use]
pub fn player_reconnected_message(participant: String) -> ServerMessage {
    ServerMessage::PlayerReconnected { name: participant }
}

/// Builds the `playerLeft` broadcast payload.
#[must_use]
pub fn player_left_message(participant: String) -> ServerMessage {
    ServerMessage::PlayerLeft { name: participant }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::room_state::ParticipantRecord;
    use crate::protocol::types::GameLanguage;
    use chrono::Utc;
    use uuid::Uuid;

    fn make_room() -> Room {
        Room::new("ABCD", "Test Room", GameLanguage::En, false, true, 8)
    }

    #[test]
    fn select_handoff_host_picks_earliest_joined_non_host_active() {
        let mut room = make_room();
        let mut h1 = ParticipantRecord::new("h1", None, true, Uuid::new_v4(), None, None);
        h1.joined_at = Utc::now() - chrono::Duration::seconds(10);
        let mut p1 = ParticipantRecord::new("p1", None, false, Uuid::new_v4(), None, None);
        p1.joined_at = Utc::now() - chrono::Duration::seconds(5);
        let mut p2 = ParticipantRecord::new("p2", None, false, Uuid::new_v4(), None, None);
        p2.joined_at = Utc::now() - chrono::Duration::seconds(8);
        room.add_participant(h1);
        room.add_participant(p1);
        room.add_participant(p2);

        assert_eq!(select_handoff_host(&room), Some("p2".to_string()));
    }

    #[test]
    fn select_handoff_host_none_when_only_host_present() {
        let mut room = make_room();
        let h1 = ParticipantRecord::new("h1", None, true, Uuid::new_v4(), None, None);
        room.add_participant(h1);

        assert_eq!(select_handoff_host(&room), None);
    }

    #[test]
    fn presence_transitions_follow_missed_heartbeat_thresholds() {
        assert_eq!(
            sample_presence_transition(0, PresenceStatus::Idle, 3),
            Some(PresenceStatus::Active)
        );
        assert_eq!(
            sample_presence_transition(1, PresenceStatus::Active, 3),
            Some(PresenceStatus::Idle)
        );
        assert_eq!(
            sample_presence_transition(3, PresenceStatus::Idle, 3),
            Some(PresenceStatus::Weak)
        );
        assert_eq!(
            sample_presence_transition(6, PresenceStatus::Weak, 3),
            Some(PresenceStatus::Away)
        );
        assert_eq!(sample_presence_transition(3, PresenceStatus::Weak, 3), None);
    }

    #[test]
    fn classify_takeover_variants() {
        let conn_a = Uuid::new_v4();
        let conn_b = Uuid::new_v4();
        let room_a = "AAAA".to_string();
        let room_b = "BBBB".to_string();

        assert_eq!(classify_takeover(None, &room_a, conn_b), TakeoverKind::None);
        assert_eq!(
            classify_takeover(Some((&room_a, conn_a)), &room_a, conn_a),
            TakeoverKind::IdempotentSameSocket
        );
        assert_eq!(
            classify_takeover(Some((&room_a, conn_a)), &room_a, conn_b),
            TakeoverKind::SameRoomDifferentSocket {
                room_code: room_a.clone()
            }
        );
        assert_eq!(
            classify_takeover(Some((&room_a, conn_a)), &room_b, conn_b),
            TakeoverKind::DifferentRoom { room_code: room_a }
        );
    }
}
