//! Message coordination and round operation management
//!
//! - Message deduplication (LRU-based cache), used for idempotent
//!   `startGameAck` handling (§8).
//! - Round coordination: start barrier, 1 Hz tick, end-of-round scoring (§4.6).
//!
//! In-memory-only implementation; no cross-instance bus in this core (§1
//! Non-goals — consensus across instances is the key/value store's job).

pub mod dedup;
pub mod round_coordinator;

pub use dedup::DedupCacheSettings;
pub use round_coordinator::{InMemoryRoundCoordinator, RoundCoordinatorTrait};

use crate::protocol::{RoomCode, ServerMessage};
use std::sync::Arc;

/// Dispatcher's broadcast surface (§4.1, §4.2): sending to one connection or
/// to a room, with an exclusion for migrating-session suppression.
#[async_trait::async_trait]
pub trait MessageCoordinator: Send + Sync {
    async fn send_to_connection(
        &self,
        connection_id: &crate::protocol::ConnectionId,
        message: Arc<ServerMessage>,
    ) -> anyhow::Result<()>;

    async fn broadcast_to_room(
        &self,
        room_code: &RoomCode,
        message: Arc<ServerMessage>,
    ) -> anyhow::Result<()>;

    async fn broadcast_to_room_except(
        &self,
        room_code: &RoomCode,
        except_connection: &crate::protocol::ConnectionId,
        message: Arc<ServerMessage>,
    ) -> anyhow::Result<()>;

    async fn register_local_client(
        &self,
        connection_id: crate::protocol::ConnectionId,
        room_code: Option<RoomCode>,
        sender: tokio::sync::mpsc::Sender<Arc<ServerMessage>>,
    ) -> anyhow::Result<()>;

    async fn unregister_local_client(
        &self,
        connection_id: &crate::protocol::ConnectionId,
    ) -> anyhow::Result<()>;
}
