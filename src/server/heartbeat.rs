//! Presence heartbeat sampling (§4.8): a periodic sweep that advances each
//! active participant's missed-heartbeat counter and broadcasts the
//! resulting presence transitions.
//!
//! Grounded on the predecessor's `handle_ping`/throttled-last-seen shape,
//! generalized from a boolean online/offline flag into the four-state
//! `PresenceStatus` ladder `reconnection::sample_presence_transition` drives.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::coordination::round_coordinator::RoomHandle;
use crate::coordination::MessageCoordinator;
use crate::protocol::ServerMessage;
use crate::reconnection::sample_presence_transition;

use super::LexiclashServer;

impl LexiclashServer {
    /// Spawns the presence sampler: every `presence_heartbeat_interval_secs`,
    /// every active participant's `missed_heartbeats` advances by one unless
    /// a `presenceHeartbeat`/`presenceUpdate` has reset it in the meantime
    /// (see `room_service::handle_presence_heartbeat`).
    pub(crate) fn spawn_presence_sampler(self: Arc<Self>) {
        let interval_secs = self.config.server.presence_heartbeat_interval_secs.max(1);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sample_all_rooms_presence().await;
            }
        });
    }

    async fn sample_all_rooms_presence(&self) {
        let threshold = self.config.server.presence_missed_heartbeat_threshold;
        let room_handles: Vec<RoomHandle> = self.rooms.iter().map(|entry| Arc::clone(entry.value())).collect();

        for room_handle in room_handles {
            let (room_code, transitions) = self.sample_room_presence(&room_handle, threshold).await;
            for (name, status) in transitions {
                let message = Arc::new(ServerMessage::PlayerConnectionStatusChanged { name, status });
                if let Err(err) = self.broadcast_to_room(&room_code, message).await {
                    debug!(%room_code, error = %err, "failed to broadcast presence transition");
                }
            }
        }
    }

    async fn sample_room_presence(
        &self,
        room_handle: &RoomHandle,
        threshold: u32,
    ) -> (String, Vec<(String, crate::protocol::PresenceStatus)>) {
        let mut room = room_handle.lock().await;
        let room_code = room.code.clone();
        let mut transitions = Vec::new();
        let names: Vec<String> = room.join_order.clone();
        for name in names {
            let Some(record) = room.participants.get_mut(&name) else {
                continue;
            };
            if !record.is_active() {
                continue;
            }
            record.missed_heartbeats = record.missed_heartbeats.saturating_add(1);
            if let Some(next) = sample_presence_transition(record.missed_heartbeats, record.presence_status, threshold)
            {
                record.presence_status = next;
                transitions.push((name, next));
            }
        }
        (room_code, transitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::protocol::room_state::ParticipantRecord;
    use crate::protocol::types::{GameLanguage, PresenceStatus};
    use crate::protocol::Room;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    async fn test_server() -> Arc<LexiclashServer> {
        LexiclashServer::new(Config::default()).await.expect("server constructs")
    }

    #[tokio::test]
    async fn sampling_advances_missed_heartbeats_and_reports_transitions() {
        let server = test_server().await;
        let mut room = Room::new("ABCD", "Test Room", GameLanguage::En, false, true, 8);
        room.add_participant(ParticipantRecord::new("alice", None, true, Uuid::new_v4(), None, None));
        let handle: RoomHandle = Arc::new(Mutex::new(room));
        server.rooms.insert("ABCD".to_string(), Arc::clone(&handle));

        let (room_code, transitions) = server.sample_room_presence(&handle, 3).await;
        assert_eq!(room_code, "ABCD");
        assert_eq!(transitions, vec![("alice".to_string(), PresenceStatus::Idle)]);

        let room = handle.lock().await;
        assert_eq!(room.participants["alice"].missed_heartbeats, 1);
    }

    #[tokio::test]
    async fn disconnected_participants_are_skipped() {
        let server = test_server().await;
        let mut room = Room::new("ABCD", "Test Room", GameLanguage::En, false, true, 8);
        let mut record = ParticipantRecord::new("alice", None, true, Uuid::new_v4(), None, None);
        record.disconnected = true;
        room.add_participant(record);
        let handle: RoomHandle = Arc::new(Mutex::new(room));
        server.rooms.insert("ABCD".to_string(), Arc::clone(&handle));

        let (_, transitions) = server.sample_room_presence(&handle, 3).await;
        assert!(transitions.is_empty());
    }
}
