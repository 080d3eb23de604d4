//! Default value functions for configuration fields.
//!
//! This module contains all the default value functions used by serde's `#[serde(default = ...)]`
//! attributes throughout the configuration system. Functions are organized by category for
//! easier maintenance.

use super::logging::LogFormat;

// =============================================================================
// Port & Root Config
// =============================================================================

pub const fn default_port() -> u16 {
    3536
}

// =============================================================================
// Server Defaults
// =============================================================================

pub const fn default_max_players() -> u8 {
    8
}

pub const fn default_ping_timeout() -> u64 {
    30
}

/// Default threshold for heartbeat throttling (seconds).
/// Controls how frequently heartbeat timestamps are recorded.
pub const fn default_heartbeat_throttle_secs() -> u64 {
    30
}

pub const fn default_room_cleanup_interval() -> u64 {
    60
}

pub const fn default_max_rooms_per_game() -> usize {
    1000
}

pub const fn default_empty_room_timeout() -> u64 {
    300 // 5 minutes
}

pub const fn default_inactive_room_timeout() -> u64 {
    3600 // 1 hour
}

pub const fn default_event_buffer_size() -> usize {
    100 // Buffer last 100 events per room
}

pub const fn default_enable_reconnection() -> bool {
    true
}

/// Grace period before a disconnected player's seat is forfeited (§4.8).
pub const fn default_player_reconnection_grace_secs() -> u64 {
    30
}

/// Grace period before a disconnected host's authority transfers (§4.8).
pub const fn default_host_reconnection_grace_secs() -> u64 {
    15
}

/// Heartbeats missed before a participant is marked `weak`/`away` (§4.8).
pub const fn default_presence_missed_heartbeat_threshold() -> u32 {
    2
}

pub const fn default_presence_heartbeat_interval_secs() -> u64 {
    10
}

/// Per-room cap on AI-oracle calls made during a single end-of-round pass
/// (§4.6 "per-room budget"). Words beyond this cap stay undecided for host
/// adjudication via `validateWords` rather than all being sent to the oracle.
pub const fn default_end_of_round_ai_budget() -> usize {
    5
}

/// How long a round's unresolved words stay open for host adjudication via
/// `validateWords` before auto-validation falls back to dictionary-only (§4.6).
pub const fn default_validation_deadline_secs() -> i64 {
    20
}

// =============================================================================
// Rate Limit Defaults (§4.1, §6: per-connection weighted operation budget)
// =============================================================================

pub const fn default_rate_limit_window_secs() -> u64 {
    10
}

pub const fn default_rate_limit_budget_per_window() -> u32 {
    30
}

pub const fn default_rate_weight_submit_word() -> u32 {
    2
}

pub const fn default_rate_weight_chat() -> u32 {
    3
}

pub const fn default_rate_weight_default() -> u32 {
    1
}

pub const fn default_rate_limit_room_creations_per_window() -> u32 {
    5
}

// =============================================================================
// Protocol Defaults
// =============================================================================

pub const fn default_max_room_name_length() -> usize {
    64
}

pub const fn default_room_code_length() -> usize {
    4
}

pub const fn default_max_participant_name_length() -> usize {
    32
}

pub const fn default_max_players_limit() -> u8 {
    16
}

pub const fn default_min_word_length() -> usize {
    3
}

// =============================================================================
// Participant Name Validation Defaults
// =============================================================================

pub const fn default_allow_unicode_participant_names() -> bool {
    true
}

pub const fn default_allow_spaces_in_participant_names() -> bool {
    true
}

pub const fn default_allow_leading_trailing_whitespace() -> bool {
    false
}

pub fn default_allowed_participant_name_symbols() -> Vec<char> {
    vec!['-', '_']
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    true
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

// =============================================================================
// Metrics Defaults
// =============================================================================

pub const fn default_dashboard_cache_refresh_interval_secs() -> u64 {
    5
}

pub const fn default_dashboard_cache_ttl_secs() -> u64 {
    30
}

// =============================================================================
// Coordination Defaults
// =============================================================================

pub const fn default_dedup_cache_capacity() -> usize {
    100_000
}

pub const fn default_dedup_cache_ttl_secs() -> u64 {
    60
}

pub const fn default_dedup_cache_cleanup_interval_secs() -> u64 {
    30
}

// =============================================================================
// WebSocket Defaults
// =============================================================================

/// Largest text frame accepted from a client (bytes, §7 transport limits).
pub const fn default_max_frame_bytes() -> usize {
    64 * 1024
}

// =============================================================================
// Persistence Defaults (§4.4, §6 persistence schema)
// =============================================================================

pub fn default_persistence_namespace() -> String {
    "lexiclash".to_string()
}

pub fn default_persistence_version() -> String {
    "v1".to_string()
}

pub const fn default_room_ttl_secs() -> u64 {
    3600
}

pub const fn default_tournament_ttl_secs() -> u64 {
    86_400
}

pub const fn default_ttl_jitter_percent() -> f64 {
    10.0
}

pub const fn default_circuit_breaker_failure_threshold() -> u32 {
    5
}

pub const fn default_circuit_breaker_cooldown_secs() -> u64 {
    30
}

pub const fn default_lock_acquire_max_retries() -> u32 {
    10
}

pub const fn default_lock_acquire_retry_delay_ms() -> u64 {
    50
}

pub const fn default_scan_cursor_max() -> usize {
    500
}
