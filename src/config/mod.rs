//! Configuration module.
//!
//! Provides comprehensive configuration management with support for:
//! - JSON configuration files
//! - Environment variable overrides
//! - Stdin input
//! - Sensible defaults
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`server`]: Server behavior configuration (rooms, players, timeouts, reconnection grace)
//! - [`protocol`]: Protocol settings (naming rules, limits)
//! - [`rate_limit`]: Per-connection weighted operation budget (§4.1)
//! - [`persistence`]: Persistence Mirror keyspace/TTL/circuit-breaker settings (§4.4)
//! - [`logging`]: Logging configuration
//! - [`coordination`]: Idempotency/dedup cache settings (§8)
//! - [`metrics`]: Metrics configuration
//! - [`websocket`]: WebSocket connection settings
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

// Submodules
pub mod coordination;
pub mod defaults;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod persistence;
pub mod protocol;
pub mod rate_limit;
pub mod server;
pub mod types;
pub mod validation;
pub mod websocket;

// Re-exports for convenience
pub use coordination::{CoordinationConfig, DedupCacheConfig};

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use metrics::MetricsConfig;

pub use persistence::PersistenceConfig;

pub use protocol::{PlayerNameValidationConfig, ProtocolConfig};

pub use rate_limit::RateLimitConfig;

pub use server::ServerConfig;

pub use types::Config;

pub use validation::{is_production_mode, validate_config_security};

pub use websocket::WebSocketConfig;
