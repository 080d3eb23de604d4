//! Transport-disconnect integration (§4.8): what happens when a WebSocket
//! closes without an explicit `leaveRoom`. Marks the participant disconnected
//! in place, starts the host- or player-grace timer on `ReconnectionController`,
//! and broadcasts the outcome when the timer fires. A participant who
//! reconnects before the timer expires resumes their seat via
//! `room_service::handle_join`'s reconnection branch, which cancels this timer.
//!
//! Grounded on `room_service.rs`'s `handle_leave_room` for the host hand-off
//! and room-teardown shapes, generalized from "leave now" to "leave after a
//! grace period unless the same name reconnects first".

use std::sync::Arc;

use tracing::{info, warn};

use crate::coordination::MessageCoordinator;
use crate::protocol::ConnectionId;
use crate::reconnection::{
    host_disconnected_message, host_transferred_message, player_disconnected_message,
    player_left_message, HostGraceOutcome, PlayerGraceOutcome,
};

use super::LexiclashServer;

impl LexiclashServer {
    /// Called from the websocket read loop when a connection's socket closes
    /// (read returns `None` or errors) without a preceding `leaveRoom`.
    pub async fn handle_disconnect(self: &Arc<Self>, connection_id: ConnectionId) {
        let Some((room_code, name)) = self.connections.room_participant_for(&connection_id) else {
            self.connections.remove(&connection_id);
            return;
        };
        self.connections.remove(&connection_id);

        let Some(room_handle) = self.room_handle(&room_code) else {
            return;
        };

        let is_host = {
            let mut guard = room_handle.lock().await;
            let Some(record) = guard.participants.get_mut(&name) else {
                return;
            };
            if record.disconnected {
                return;
            }
            record.disconnected = true;
            record.disconnected_at = Some(chrono::Utc::now());
            let is_host = record.is_host;
            guard.update_activity();
            is_host
        };

        if is_host {
            let grace_ms = self.reconnection.host_grace_period().as_millis() as u64;
            info!(room_code = %room_code, participant = %name, grace_ms, "host disconnected, starting grace period");
            let _ = self
                .broadcast_to_room(&room_code, Arc::new(host_disconnected_message(grace_ms)))
                .await;

            let server = Arc::clone(self);
            let coordinator: Arc<dyn MessageCoordinator> = server.clone();
            self.reconnection
                .schedule_host_disconnect(room_code.clone(), room_handle, coordinator, {
                    let server = Arc::clone(&server);
                    move |outcome, room, _coordinator| {
                        let server = Arc::clone(&server);
                        async move { server.on_host_grace_expired(outcome, room).await }
                    }
                })
                .await;
        } else {
            let grace_ms = self.reconnection.player_grace_period().as_millis() as u64;
            info!(room_code = %room_code, participant = %name, grace_ms, "player disconnected, starting grace period");
            let _ = self
                .broadcast_to_room(&room_code, Arc::new(player_disconnected_message(name.clone())))
                .await;

            let server = Arc::clone(self);
            let coordinator: Arc<dyn MessageCoordinator> = server.clone();
            self.reconnection
                .schedule_player_disconnect(room_code.clone(), name, room_handle, coordinator, {
                    let server = Arc::clone(&server);
                    move |outcome, room, _coordinator| {
                        let server = Arc::clone(&server);
                        async move { server.on_player_grace_expired(outcome, room).await }
                    }
                })
                .await;
        }
    }

    async fn on_host_grace_expired(
        self: &Arc<Self>,
        outcome: HostGraceOutcome,
        room: crate::coordination::round_coordinator::RoomHandle,
    ) {
        match outcome {
            HostGraceOutcome::HandedOff { new_host } => {
                let snapshot = room.lock().await.clone();
                let room_code = snapshot.code.clone();
                self.persist_room(&room_code, &snapshot).await;
                self.metrics.increment_host_transfers();
                info!(room_code = %room_code, new_host = %new_host, "host grace expired, handed off");
                let _ = self
                    .broadcast_to_room(&room_code, Arc::new(host_transferred_message(new_host)))
                    .await;
            }
            HostGraceOutcome::RoomEmptied => {
                let room_code = room.lock().await.code.clone();
                self.rooms.remove(&room_code);
                self.round_coordinator.cancel(&room_code).await;
                self.reconnection.cancel_room(&room_code).await;
                let _ = self.persistence.delete_room(&room_code).await;
                info!(room_code = %room_code, "host grace expired, room emptied");
                let _ = self
                    .broadcast_to_room(&room_code, Arc::new(crate::protocol::ServerMessage::HostLeftRoomClosing))
                    .await;
            }
        }
    }

    async fn on_player_grace_expired(
        self: &Arc<Self>,
        outcome: PlayerGraceOutcome,
        room: crate::coordination::round_coordinator::RoomHandle,
    ) {
        let snapshot = room.lock().await.clone();
        let room_code = snapshot.code.clone();
        self.persist_room(&room_code, &snapshot).await;
        self.metrics.increment_players_left();
        info!(room_code = %room_code, participant = %outcome.participant, "player grace expired, removed");
        if let Err(err) = self
            .broadcast_to_room(&room_code, Arc::new(player_left_message(outcome.participant)))
            .await
        {
            warn!(room_code = %room_code, error = %err, "failed to broadcast playerLeft after grace expiry");
        }
    }
}
