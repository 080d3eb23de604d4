//! Connection Registry (§2 item 2, §4.2): three synchronized mappings
//! between a transport connection, the room/participant it is playing as,
//! and the authenticated identity behind it.
//!
//! Grounded on `connection_manager.rs`'s `DashMap`-backed registry (per-IP
//! connection accounting, a single writer per connection) generalized from
//! a flat player-id keyspace into the room-code/participant-name pairing
//! this protocol uses, plus the auth-user-id index §4.2 and §4.8's
//! multi-tab takeover logic need.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use crate::protocol::{AuthUserId, ConnectionId, RoomCode, ServerMessage};

/// A room code paired with the participant name a connection is playing as.
pub type RoomParticipant = (RoomCode, String);

#[derive(Debug, Error)]
pub enum RegisterConnectionError {
    #[error("too many connections from your IP ({current}/{limit})")]
    IpLimitExceeded { current: usize, limit: usize },
}

#[derive(Debug, Clone)]
struct ConnectionEntry {
    sender: mpsc::Sender<Arc<ServerMessage>>,
    client_addr: SocketAddr,
    last_ping: Instant,
    room_participant: Option<RoomParticipant>,
    auth_user_id: Option<AuthUserId>,
    /// Set while a session is being handed off to a newer connection for
    /// the same identity (§4.8 multi-tab takeover). A connection tagged
    /// migrating has any in-flight handler's result suppressed by the
    /// dispatcher rather than committed.
    migrating: bool,
}

/// Three synchronized views over the live connection set (§4.2).
pub struct ConnectionRegistry {
    by_connection: DashMap<ConnectionId, ConnectionEntry>,
    by_room_participant: DashMap<RoomParticipant, ConnectionId>,
    by_auth_user: DashMap<AuthUserId, (RoomParticipant, ConnectionId, bool)>,
    connections_per_ip: DashMap<IpAddr, usize>,
    max_connections_per_ip: usize,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new(max_connections_per_ip: usize) -> Self {
        Self {
            by_connection: DashMap::new(),
            by_room_participant: DashMap::new(),
            by_auth_user: DashMap::new(),
            connections_per_ip: DashMap::new(),
            max_connections_per_ip,
        }
    }

    /// Registers a brand-new transport connection, not yet joined to a room.
    pub fn register(
        &self,
        connection_id: ConnectionId,
        sender: mpsc::Sender<Arc<ServerMessage>>,
        client_addr: SocketAddr,
    ) -> Result<(), RegisterConnectionError> {
        let ip = client_addr.ip();
        let mut slot = self.connections_per_ip.entry(ip).or_insert(0);
        if *slot >= self.max_connections_per_ip {
            return Err(RegisterConnectionError::IpLimitExceeded {
                current: *slot,
                limit: self.max_connections_per_ip,
            });
        }
        *slot += 1;
        drop(slot);

        self.by_connection.insert(
            connection_id,
            ConnectionEntry {
                sender,
                client_addr,
                last_ping: Instant::now(),
                room_participant: None,
                auth_user_id: None,
                migrating: false,
            },
        );
        Ok(())
    }

    /// Removes a connection entirely, releasing all three mappings and its
    /// IP slot.
    pub fn remove(&self, connection_id: &ConnectionId) {
        if let Some((_, entry)) = self.by_connection.remove(connection_id) {
            if let Some(rp) = entry.room_participant {
                self.by_room_participant.remove(&rp);
            }
            if let Some(auth_id) = entry.auth_user_id {
                self.by_auth_user.remove(&auth_id);
            }
            self.release_ip_slot(entry.client_addr.ip());
        }
    }

    /// Associates a connection with a room/participant pair and, if
    /// authenticated, the auth-user index.
    pub fn assign_room_participant(
        &self,
        connection_id: ConnectionId,
        room_code: RoomCode,
        participant: String,
        auth_user_id: Option<AuthUserId>,
        is_host: bool,
    ) {
        let rp = (room_code, participant);
        if let Some(mut entry) = self.by_connection.get_mut(&connection_id) {
            if let Some(old_rp) = entry.room_participant.take() {
                self.by_room_participant.remove(&old_rp);
            }
            entry.room_participant = Some(rp.clone());
            entry.auth_user_id = auth_user_id.clone();
        }
        self.by_room_participant.insert(rp.clone(), connection_id);
        if let Some(auth_id) = auth_user_id {
            self.by_auth_user
                .insert(auth_id, (rp, connection_id, is_host));
        }
    }

    /// Clears the room/participant association for a connection (leave,
    /// player removed after grace expiry) without dropping the connection.
    pub fn clear_room_participant(&self, connection_id: &ConnectionId) {
        if let Some(mut entry) = self.by_connection.get_mut(connection_id) {
            if let Some(rp) = entry.room_participant.take() {
                self.by_room_participant.remove(&rp);
            }
            if let Some(auth_id) = entry.auth_user_id.take() {
                self.by_auth_user.remove(&auth_id);
            }
        }
    }

    #[must_use]
    pub fn room_participant_for(&self, connection_id: &ConnectionId) -> Option<RoomParticipant> {
        self.by_connection
            .get(connection_id)
            .and_then(|entry| entry.room_participant.clone())
    }

    #[must_use]
    pub fn connection_for_participant(
        &self,
        room_code: &RoomCode,
        participant: &str,
    ) -> Option<ConnectionId> {
        self.by_room_participant
            .get(&(room_code.clone(), participant.to_string()))
            .map(|entry| *entry)
    }

    /// Looks up an auth user's existing session, for multi-tab takeover
    /// classification (§4.8).
    #[must_use]
    pub fn session_for_auth_user(
        &self,
        auth_user_id: &AuthUserId,
    ) -> Option<(RoomParticipant, ConnectionId, bool)> {
        self.by_auth_user.get(auth_user_id).map(|entry| entry.clone())
    }

    /// Tags a connection as migrating (§4.8): the dispatcher suppresses any
    /// handler result for a message whose handling began while tagged.
    pub fn mark_migrating(&self, connection_id: &ConnectionId) {
        if let Some(mut entry) = self.by_connection.get_mut(connection_id) {
            entry.migrating = true;
        }
    }

    #[must_use]
    pub fn is_migrating(&self, connection_id: &ConnectionId) -> bool {
        self.by_connection
            .get(connection_id)
            .is_some_and(|entry| entry.migrating)
    }

    pub fn sender(&self, connection_id: &ConnectionId) -> Option<mpsc::Sender<Arc<ServerMessage>>> {
        self.by_connection
            .get(connection_id)
            .map(|entry| entry.sender.clone())
    }

    pub fn record_ping(&self, connection_id: &ConnectionId) {
        if let Some(mut entry) = self.by_connection.get_mut(connection_id) {
            entry.last_ping = Instant::now();
        }
    }

    /// Connections that haven't pinged within `timeout`.
    #[must_use]
    pub fn expired_connections(&self, timeout: std::time::Duration) -> Vec<ConnectionId> {
        self.by_connection
            .iter()
            .filter(|entry| entry.last_ping.elapsed() > timeout)
            .map(|entry| *entry.key())
            .collect()
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.by_connection.len()
    }

    /// All connections currently playing in `room_code`, for `broadcast_to_room`.
    #[must_use]
    pub fn connections_in_room(&self, room_code: &RoomCode) -> Vec<ConnectionId> {
        self.by_room_participant
            .iter()
            .filter(|entry| &entry.key().0 == room_code)
            .map(|entry| *entry.value())
            .collect()
    }

    fn release_ip_slot(&self, ip: IpAddr) {
        if let Some(mut slot) = self.connections_per_ip.get_mut(&ip) {
            *slot = slot.saturating_sub(1);
            if *slot == 0 {
                drop(slot);
                self.connections_per_ip.remove(&ip);
            }
        } else {
            warn!(%ip, "Released IP slot with no tracked connections");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> mpsc::Sender<Arc<ServerMessage>> {
        let (tx, _rx) = mpsc::channel(8);
        tx
    }

    #[test]
    fn register_and_assign_round_trips_through_all_three_maps() {
        let registry = ConnectionRegistry::new(10);
        let conn = ConnectionId::new_v4();
        let addr: SocketAddr = "127.0.0.1:1234".parse().unwrap();
        registry.register(conn, channel(), addr).unwrap();

        registry.assign_room_participant(
            conn,
            "ABCD".to_string(),
            "alice".to_string(),
            Some("auth-1".to_string()),
            true,
        );

        assert_eq!(
            registry.room_participant_for(&conn),
            Some(("ABCD".to_string(), "alice".to_string()))
        );
        assert_eq!(
            registry.connection_for_participant(&"ABCD".to_string(), "alice"),
            Some(conn)
        );
        let (rp, found_conn, is_host) =
            registry.session_for_auth_user(&"auth-1".to_string()).unwrap();
        assert_eq!(rp, ("ABCD".to_string(), "alice".to_string()));
        assert_eq!(found_conn, conn);
        assert!(is_host);
    }

    #[test]
    fn remove_releases_all_mappings_and_ip_slot() {
        let registry = ConnectionRegistry::new(1);
        let conn = ConnectionId::new_v4();
        let addr: SocketAddr = "127.0.0.1:1234".parse().unwrap();
        registry.register(conn, channel(), addr).unwrap();
        registry.assign_room_participant(
            conn,
            "ABCD".to_string(),
            "alice".to_string(),
            Some("auth-1".to_string()),
            true,
        );

        registry.remove(&conn);

        assert!(registry.room_participant_for(&conn).is_none());
        assert!(registry
            .connection_for_participant(&"ABCD".to_string(), "alice")
            .is_none());
        assert!(registry.session_for_auth_user(&"auth-1".to_string()).is_none());

        // IP slot freed, so a second connection from the same IP succeeds.
        let conn2 = ConnectionId::new_v4();
        assert!(registry.register(conn2, channel(), addr).is_ok());
    }

    #[test]
    fn ip_limit_is_enforced() {
        let registry = ConnectionRegistry::new(1);
        let addr: SocketAddr = "127.0.0.1:1234".parse().unwrap();
        registry.register(ConnectionId::new_v4(), channel(), addr).unwrap();
        let result = registry.register(ConnectionId::new_v4(), channel(), addr);
        assert!(matches!(
            result,
            Err(RegisterConnectionError::IpLimitExceeded { .. })
        ));
    }

    #[test]
    fn connections_in_room_lists_only_that_rooms_occupants() {
        let registry = ConnectionRegistry::new(10);
        let addr: SocketAddr = "127.0.0.1:1234".parse().unwrap();
        let alice = ConnectionId::new_v4();
        let bob = ConnectionId::new_v4();
        let carol = ConnectionId::new_v4();
        registry.register(alice, channel(), addr).unwrap();
        registry.register(bob, channel(), addr).unwrap();
        registry.register(carol, channel(), addr).unwrap();

        registry.assign_room_participant(alice, "ABCD".to_string(), "alice".to_string(), None, true);
        registry.assign_room_participant(bob, "ABCD".to_string(), "bob".to_string(), None, false);
        registry.assign_room_participant(carol, "WXYZ".to_string(), "carol".to_string(), None, true);

        let mut occupants = registry.connections_in_room(&"ABCD".to_string());
        occupants.sort();
        let mut expected = vec![alice, bob];
        expected.sort();
        assert_eq!(occupants, expected);
    }

    #[test]
    fn migrating_tag_round_trips() {
        let registry = ConnectionRegistry::new(10);
        let conn = ConnectionId::new_v4();
        let addr: SocketAddr = "127.0.0.1:1234".parse().unwrap();
        registry.register(conn, channel(), addr).unwrap();

        assert!(!registry.is_migrating(&conn));
        registry.mark_migrating(&conn);
        assert!(registry.is_migrating(&conn));
    }
}
