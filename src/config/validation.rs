//! Configuration validation functions.

use super::Config;

/// Validate configuration for internal consistency and production-readiness.
///
/// The predecessor validated transport security (TLS cert paths, token
/// binding, metrics bearer tokens); this core terminates no transport of its
/// own (§1 Non-goals — that lives at the edge, outside this crate). What
/// remains worth guarding is the invariants the room, round and persistence
/// machinery actually depend on: nonzero budgets, sane limits, a namespaced
/// keyspace.
pub fn validate_config_security(config: &Config) -> anyhow::Result<()> {
    let is_prod = is_production_mode();

    if config.rate_limit.budget_per_window == 0 {
        anyhow::bail!("rate_limit.budget_per_window must be greater than zero");
    }
    if config.rate_limit.window_secs == 0 {
        anyhow::bail!("rate_limit.window_secs must be greater than zero");
    }

    if config.protocol.room_code_length == 0 {
        anyhow::bail!("protocol.room_code_length must be greater than zero");
    }
    if config.protocol.max_players_limit == 0 {
        anyhow::bail!("protocol.max_players_limit must be greater than zero");
    }
    if config.server.default_max_players > config.protocol.max_players_limit {
        anyhow::bail!(
            "server.default_max_players ({}) exceeds protocol.max_players_limit ({})",
            config.server.default_max_players,
            config.protocol.max_players_limit
        );
    }

    if config.persistence.circuit_breaker_failure_threshold == 0 {
        anyhow::bail!("persistence.circuit_breaker_failure_threshold must be greater than zero");
    }
    if config.persistence.namespace.trim().is_empty() {
        anyhow::bail!("persistence.namespace must not be empty");
    }

    config.websocket.validate()?;

    if is_prod && config.logging.level.is_none() {
        eprintln!(
            "WARNING: running in production mode with no explicit logging.level set; \
             defaulting to RUST_LOG or \"info\"."
        );
    }

    Ok(())
}

/// Detect if we're running in production mode.
///
/// Checks for `LEXICLASH__ENVIRONMENT` or generic `PRODUCTION` / `PROD`
/// environment variables.
pub fn is_production_mode() -> bool {
    use std::env;

    if let Ok(mode) = env::var("LEXICLASH__ENVIRONMENT") {
        return mode.eq_ignore_ascii_case("production") || mode.eq_ignore_ascii_case("prod");
    }

    env::var("LEXICLASH_PRODUCTION").is_ok()
        || env::var("PRODUCTION").is_ok()
        || env::var("PROD").is_ok()
}
