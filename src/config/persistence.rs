//! Persistence Mirror configuration (§4.4, §6): keyspace discipline, TTL
//! jitter, circuit breaker thresholds and distributed-lock retry budget.
//! Field names mirror the predecessor's Redis-flavored env vars in spirit
//! (a real deployment mirrors to a shared key/value store; this core only
//! defines the seam — see `persistence::InMemoryPersistenceMirror`).

use super::defaults::{
    default_circuit_breaker_cooldown_secs, default_circuit_breaker_failure_threshold,
    default_lock_acquire_max_retries, default_lock_acquire_retry_delay_ms,
    default_persistence_namespace, default_persistence_version, default_room_ttl_secs,
    default_scan_cursor_max, default_tournament_ttl_secs, default_ttl_jitter_percent,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PersistenceConfig {
    /// Keyspace namespace segment: `<namespace>:<version>:<kind>:<id>`
    #[serde(default = "default_persistence_namespace")]
    pub namespace: String,
    /// Keyspace version segment, bumped on incompatible schema changes
    #[serde(default = "default_persistence_version")]
    pub version: String,
    /// TTL applied to mirrored room snapshots (seconds)
    #[serde(default = "default_room_ttl_secs", with = "duration_secs")]
    pub room_ttl: Duration,
    /// TTL applied to mirrored tournament snapshots (seconds)
    #[serde(default = "default_tournament_ttl_secs", with = "duration_secs")]
    pub tournament_ttl: Duration,
    /// Jitter applied to every TTL, as a percent of the base TTL, to avoid
    /// synchronized mass-expiry ("thundering herd") of a fleet's rooms
    #[serde(default = "default_ttl_jitter_percent")]
    pub ttl_jitter_percent: f64,
    /// Consecutive failures before the circuit breaker opens
    #[serde(default = "default_circuit_breaker_failure_threshold")]
    pub circuit_breaker_failure_threshold: u32,
    /// Cooldown before an open circuit allows a half-open probe (seconds)
    #[serde(default = "default_circuit_breaker_cooldown_secs", with = "duration_secs")]
    pub circuit_breaker_cooldown: Duration,
    /// Maximum poll attempts when acquiring a per-room distributed lock
    #[serde(default = "default_lock_acquire_max_retries")]
    pub lock_acquire_max_retries: u32,
    /// Delay between distributed-lock acquisition polls (milliseconds)
    #[serde(default = "default_lock_acquire_retry_delay_ms", with = "duration_millis")]
    pub lock_acquire_retry_delay: Duration,
    /// Maximum keys returned per cursor-style keyspace scan
    #[serde(default = "default_scan_cursor_max")]
    pub scan_cursor_max: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            namespace: default_persistence_namespace(),
            version: default_persistence_version(),
            room_ttl: Duration::from_secs(default_room_ttl_secs()),
            tournament_ttl: Duration::from_secs(default_tournament_ttl_secs()),
            ttl_jitter_percent: default_ttl_jitter_percent(),
            circuit_breaker_failure_threshold: default_circuit_breaker_failure_threshold(),
            circuit_breaker_cooldown: Duration::from_secs(default_circuit_breaker_cooldown_secs()),
            lock_acquire_max_retries: default_lock_acquire_max_retries(),
            lock_acquire_retry_delay: Duration::from_millis(default_lock_acquire_retry_delay_ms()),
            scan_cursor_max: default_scan_cursor_max(),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
