//! Server behavior configuration types.

use super::defaults::{
    default_empty_room_timeout, default_enable_reconnection, default_end_of_round_ai_budget,
    default_event_buffer_size, default_heartbeat_throttle_secs,
    default_host_reconnection_grace_secs, default_inactive_room_timeout, default_max_players,
    default_max_rooms_per_game, default_ping_timeout, default_player_reconnection_grace_secs,
    default_presence_heartbeat_interval_secs, default_presence_missed_heartbeat_threshold,
    default_room_cleanup_interval, default_validation_deadline_secs,
};
use serde::{Deserialize, Serialize};

/// Server configuration for room and player management.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Default maximum players per room
    #[serde(default = "default_max_players")]
    pub default_max_players: u8,
    /// Timeout for client ping responses (seconds)
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
    /// Interval for the room sweeper task (seconds, §4.3)
    #[serde(default = "default_room_cleanup_interval")]
    pub room_cleanup_interval: u64,
    /// Maximum number of rooms tracked by the Room Store
    #[serde(default = "default_max_rooms_per_game")]
    pub max_rooms: usize,
    /// Time after creation when an empty room expires (seconds, §4.3)
    #[serde(default = "default_empty_room_timeout")]
    pub empty_room_timeout: u64,
    /// Time after last activity when a room with participants expires (seconds, §4.3)
    #[serde(default = "default_inactive_room_timeout")]
    pub inactive_room_timeout: u64,
    /// Number of events to buffer per room for the reconnection controller
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
    /// Enable the reconnection controller (host/player grace periods, §4.8)
    #[serde(default = "default_enable_reconnection")]
    pub enable_reconnection: bool,
    /// Grace period before a disconnected player's seat is forfeited (seconds, §4.8)
    #[serde(default = "default_player_reconnection_grace_secs")]
    pub player_reconnection_grace_secs: u64,
    /// Grace period before a disconnected host's authority transfers (seconds, §4.8)
    #[serde(default = "default_host_reconnection_grace_secs")]
    pub host_reconnection_grace_secs: u64,
    /// Heartbeats a participant may miss before being marked `weak`/`away` (§4.8)
    #[serde(default = "default_presence_missed_heartbeat_threshold")]
    pub presence_missed_heartbeat_threshold: u32,
    /// Interval between expected presence heartbeats (seconds)
    #[serde(default = "default_presence_heartbeat_interval_secs")]
    pub presence_heartbeat_interval_secs: u64,
    /// Threshold for heartbeat timestamp-write throttling (seconds).
    /// Set to 0 to disable throttling (update on every heartbeat).
    #[serde(default = "default_heartbeat_throttle_secs")]
    pub heartbeat_throttle_secs: u64,
    /// Per-room cap on AI-oracle calls during one end-of-round pass (§4.6)
    #[serde(default = "default_end_of_round_ai_budget")]
    pub end_of_round_ai_budget: usize,
    /// How long unresolved words stay open for host adjudication before
    /// auto-validation falls back to dictionary-only (seconds, §4.6)
    #[serde(default = "default_validation_deadline_secs")]
    pub validation_deadline_secs: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_max_players: default_max_players(),
            ping_timeout: default_ping_timeout(),
            room_cleanup_interval: default_room_cleanup_interval(),
            max_rooms: default_max_rooms_per_game(),
            empty_room_timeout: default_empty_room_timeout(),
            inactive_room_timeout: default_inactive_room_timeout(),
            event_buffer_size: default_event_buffer_size(),
            enable_reconnection: default_enable_reconnection(),
            player_reconnection_grace_secs: default_player_reconnection_grace_secs(),
            host_reconnection_grace_secs: default_host_reconnection_grace_secs(),
            presence_missed_heartbeat_threshold: default_presence_missed_heartbeat_threshold(),
            presence_heartbeat_interval_secs: default_presence_heartbeat_interval_secs(),
            heartbeat_throttle_secs: default_heartbeat_throttle_secs(),
            end_of_round_ai_budget: default_end_of_round_ai_budget(),
            validation_deadline_secs: default_validation_deadline_secs(),
        }
    }
}
