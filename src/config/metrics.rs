//! Metrics configuration.

use super::defaults::{default_dashboard_cache_refresh_interval_secs, default_dashboard_cache_ttl_secs};
use serde::{Deserialize, Serialize};

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// How often the in-process metrics snapshot is refreshed (seconds)
    pub snapshot_refresh_interval_secs: u64,
    /// How long a cached snapshot is served before a forced refresh (seconds)
    pub snapshot_ttl_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            snapshot_refresh_interval_secs: default_dashboard_cache_refresh_interval_secs(),
            snapshot_ttl_secs: default_dashboard_cache_ttl_secs(),
        }
    }
}
