#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # LexiClash
//!
//! A room lifecycle and message dispatch engine for a realtime multiplayer
//! word-grid game: one server instance holds every live room in memory,
//! drives each round's countdown and scoring, and mirrors room state to a
//! shared store so a horizontally scaled fleet stays consistent.
//!
//! Connect via WebSocket, send `createGame`/`join`, and the server takes it
//! from there.

/// Server configuration and environment variables
pub mod config;

/// Message deduplication and round-operation coordination
pub mod coordination;

/// Distributed locking and circuit breaking (in-memory implementation)
pub mod distributed;

/// Board tracing, dictionary lookup, scoring and achievements
pub mod game;

/// Structured logging configuration
pub mod logging;

/// Metrics collection and reporting
pub mod metrics;

/// Persistence Mirror: write-through room/tournament state
pub mod persistence;

/// WebSocket message protocol definitions
pub mod protocol;

/// Rate limiting implementation
pub mod rate_limit;

/// Reconnection grace periods and multi-tab takeover handling
pub mod reconnection;

/// Retry logic utilities
pub mod retry;

/// Main server orchestration
pub mod server;

/// WebSocket connection handling
pub mod websocket;
