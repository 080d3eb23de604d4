//! Room Store sweeper (§4.3): a periodic task that evicts rooms which have
//! sat empty past `empty_room_timeout` or inactive past
//! `inactive_room_timeout`, cancels their reconnection timers, and drops
//! their persisted mirror.
//!
//! Grounded on `server/maintenance.rs`'s `cleanup_task` shape (interval
//! ticker, expired-connection sweep plus a room sweep, metrics counters per
//! category), replacing the predecessor's multi-instance idempotency-claim
//! dance with a single in-process sweep since this core owns one Room Store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tokio::time::MissedTickBehavior;
use tracing::info;

use super::LexiclashServer;

impl LexiclashServer {
    /// Spawns the room sweeper and the stale-connection sweeper together,
    /// both driven by `server.room_cleanup_interval`.
    pub(crate) fn spawn_room_sweep(self: Arc<Self>) {
        let interval_secs = self.config.server.room_cleanup_interval.max(1);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sweep_expired_connections().await;
                self.sweep_expired_rooms().await;
            }
        });
    }

    async fn sweep_expired_connections(&self) {
        let timeout = Duration::from_secs(self.config.server.ping_timeout);
        let expired = self.connections.expired_connections(timeout);
        if expired.is_empty() {
            return;
        }
        self.metrics.add_expired_players_cleaned(expired.len() as u64);
        for connection_id in expired {
            info!(%connection_id, "removing expired connection");
            self.connections.remove(&connection_id);
            self.rate_limiter.forget(connection_id).await;
        }
    }

    async fn sweep_expired_rooms(&self) {
        let empty_timeout = ChronoDuration::seconds(self.config.server.empty_room_timeout as i64);
        let inactive_timeout = ChronoDuration::seconds(self.config.server.inactive_room_timeout as i64);

        let expired_codes: Vec<String> = {
            let mut codes = Vec::new();
            for entry in self.rooms.iter() {
                let room = entry.value().lock().await;
                if room.is_expired(empty_timeout, inactive_timeout) {
                    codes.push(entry.key().clone());
                }
            }
            codes
        };

        if expired_codes.is_empty() {
            return;
        }

        let mut empty_cleaned = 0u64;
        let mut inactive_cleaned = 0u64;
        for code in expired_codes {
            let was_empty = match self.rooms.get(&code) {
                Some(handle) => handle.lock().await.active_participant_count() == 0,
                None => continue,
            };
            self.rooms.remove(&code);
            self.reconnection.cancel_room(&code).await;
            if let Err(err) = self.persistence.delete_room(&code).await {
                tracing::warn!(room_code = %code, error = %err, "failed to delete persisted room snapshot");
            }
            if was_empty {
                empty_cleaned += 1;
            } else {
                inactive_cleaned += 1;
            }
            info!(room_code = %code, was_empty, "swept expired room");
        }
        if empty_cleaned > 0 {
            self.metrics.add_empty_rooms_cleaned(empty_cleaned);
        }
        if inactive_cleaned > 0 {
            self.metrics.add_inactive_rooms_cleaned(inactive_cleaned);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::coordination::round_coordinator::RoomHandle;
    use crate::protocol::room_state::ParticipantRecord;
    use crate::protocol::types::GameLanguage;
    use crate::protocol::Room;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    async fn test_server() -> Arc<LexiclashServer> {
        LexiclashServer::new(Config::default()).await.expect("server constructs")
    }

    #[tokio::test]
    async fn sweep_removes_a_long_empty_room() {
        let server = test_server().await;
        let mut room = Room::new("ABCD", "Test Room", GameLanguage::En, false, true, 8);
        room.last_activity_at = chrono::Utc::now() - chrono::Duration::seconds(10_000);
        let handle: RoomHandle = Arc::new(Mutex::new(room));
        server.rooms.insert("ABCD".to_string(), handle);

        server.sweep_expired_rooms().await;

        assert!(server.rooms.get("ABCD").is_none());
    }

    #[tokio::test]
    async fn sweep_keeps_a_recently_active_room_with_participants() {
        let server = test_server().await;
        let mut room = Room::new("ABCD", "Test Room", GameLanguage::En, false, true, 8);
        room.add_participant(ParticipantRecord::new("alice", None, true, Uuid::new_v4(), None, None));
        let handle: RoomHandle = Arc::new(Mutex::new(room));
        server.rooms.insert("ABCD".to_string(), handle);

        server.sweep_expired_rooms().await;

        assert!(server.rooms.get("ABCD").is_some());
    }
}
