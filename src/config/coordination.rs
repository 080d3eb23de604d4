//! Idempotency/dedup cache configuration.

use super::defaults::{
    default_dedup_cache_capacity, default_dedup_cache_cleanup_interval_secs,
    default_dedup_cache_ttl_secs,
};
use serde::{Deserialize, Serialize};

/// Coordination configuration: idempotent `startGameAck` dedup cache (§8).
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CoordinationConfig {
    #[serde(default)]
    pub dedup_cache: DedupCacheConfig,
}

/// Deduplication cache configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DedupCacheConfig {
    #[serde(default = "default_dedup_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_dedup_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_dedup_cache_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for DedupCacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_dedup_cache_capacity(),
            ttl_secs: default_dedup_cache_ttl_secs(),
            cleanup_interval_secs: default_dedup_cache_cleanup_interval_secs(),
        }
    }
}
