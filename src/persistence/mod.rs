//! Persistence Mirror (§2 item 3, §4.4): the write-through, degradable copy
//! of room and tournament state in the shared key/value store, plus the
//! distributed locks used to serialize mutations across a horizontally
//! scaled fleet.
//!
//! Grounded on `database/mod.rs`'s trait-plus-single-impl shape (percentile
//! helpers dropped — those were P2P dashboard metrics, no analogue here),
//! `distributed.rs`'s `CircuitBreaker`/`InMemoryDistributedLock` (reused
//! verbatim), and `retry.rs`'s `RetryExecutor`/`RetryConfig` (reused
//! verbatim). There is no real external store in-process (DESIGN.md §10.7),
//! so the "preferred server-side script, watch/commit fallback" split in
//! §4.4 collapses to a single version-tagged compare-and-swap path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::PersistenceConfig;
use crate::distributed::CircuitBreaker;
use crate::protocol::{Room, RoomCode};
use crate::retry::{RetryConfig, RetryExecutor};

/// Word-approval counter (§6 persistence schema): `{approvalCount, gameIds[],
/// firstApproved, lastApproved}`, updated via the optimistic transactional
/// path (§4.4) when a host approves a non-dictionary word in `validateWords`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WordApprovalCounter {
    pub approval_count: u32,
    pub game_ids: Vec<String>,
    pub first_approved: Option<DateTime<Utc>>,
    pub last_approved: Option<DateTime<Utc>>,
}

/// Opaque snapshot of a tournament aggregate. The tournament subsystem
/// itself is an external collaborator (§1 Out of scope); the core only
/// mirrors whatever blob the collaborator hands it.
pub type TournamentSnapshot = serde_json::Value;

/// Outcome of a write call: distinguishes an actual store write from a
/// no-op taken because the circuit breaker is open (§4.4 graceful
/// degradation). Callers use this to decide whether to surface a one-shot
/// `warning(persistence)` to the room's host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Persisted,
    Degraded,
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock busy: {0}")]
    Busy(String),
    #[error("lock acquisition budget exhausted for {0}")]
    BudgetExhausted(String),
}

/// Persistence Mirror (§4.4). All operations are infallible to the caller in
/// the sense that a backing-store outage never surfaces as an `Err` from the
/// data-mutating calls — see `PersistOutcome`. Lock acquisition is the one
/// exception: a caller that cannot acquire the lock within budget must not
/// mutate, so that path returns `Err`.
#[async_trait]
pub trait PersistenceMirror: Send + Sync {
    async fn save_room(&self, code: &RoomCode, snapshot: &Room) -> Result<PersistOutcome>;
    async fn load_room(&self, code: &RoomCode) -> Result<Option<Room>>;
    async fn delete_room(&self, code: &RoomCode) -> Result<PersistOutcome>;
    async fn list_room_codes(&self) -> Result<Vec<RoomCode>>;

    async fn save_tournament(&self, id: &str, snapshot: &TournamentSnapshot) -> Result<PersistOutcome>;
    async fn load_tournament(&self, id: &str) -> Result<Option<TournamentSnapshot>>;
    async fn delete_tournament(&self, id: &str) -> Result<PersistOutcome>;
    async fn list_tournament_ids(&self) -> Result<Vec<String>>;

    /// Set-if-absent with expiry (§4.4). `holder_id` is the caller's unique
    /// identity for this acquisition (e.g. a per-instance UUID). Polls with
    /// bounded retries; returns `Err` if the budget is exhausted.
    async fn acquire_room_lock(&self, code: &RoomCode, holder_id: &str, ttl: Duration) -> Result<()>;

    /// Compare-and-delete matching `holder_id`.
    async fn release_room_lock(&self, code: &RoomCode, holder_id: &str) -> Result<bool>;

    /// Compare-and-pexpire matching `holder_id`.
    async fn extend_room_lock(&self, code: &RoomCode, holder_id: &str, ttl: Duration) -> Result<bool>;

    /// Optimistic transactional update for word-approval counters (§4.4,
    /// §6): read current value, apply `mutate`, conditional commit guarded
    /// by a version watch; bounded retry with exponential backoff on
    /// conflict.
    async fn record_word_approval(
        &self,
        normalized_word: &str,
        game_id: &str,
    ) -> Result<WordApprovalCounter>;

    /// Current circuit breaker state, for host-facing degraded warnings and
    /// `/metrics/redis`-style introspection (§6 HTTP surface, out of core
    /// scope but the state is this module's to expose).
    async fn is_degraded(&self) -> bool;
}

struct StoredValue {
    bytes: Vec<u8>,
    expires_at: DateTime<Utc>,
    version: u64,
}

struct LockEntry {
    holder_id: String,
    expires_at: DateTime<Utc>,
}

/// In-memory stand-in for the shared key/value store (§1: a sibling
/// persistence component mirrors room state to a shared store in a real
/// deployment; this core only defines and exercises the seam). Keyspace
/// discipline, TTL jitter, circuit breaker, and retries are all real and
/// independently testable even though the backing map is local.
pub struct InMemoryPersistenceMirror {
    config: PersistenceConfig,
    rooms: DashMap<String, StoredValue>,
    tournaments: DashMap<String, StoredValue>,
    word_approvals: DashMap<String, StoredValue>,
    locks: DashMap<String, LockEntry>,
    breaker: CircuitBreaker,
    retry: RetryExecutor,
    /// Test/ops hook: forces every store call to fail, to exercise §4.4's
    /// graceful-degradation contract without a real external dependency.
    force_unavailable: AtomicBool,
    version_counter: AtomicU64,
}

impl InMemoryPersistenceMirror {
    #[must_use]
    pub fn new(config: PersistenceConfig) -> Self {
        let breaker = CircuitBreaker::new(
            config.circuit_breaker_failure_threshold,
            config.circuit_breaker_cooldown,
        );
        let retry = RetryExecutor::new(RetryConfig::storage());
        Self {
            config,
            rooms: DashMap::new(),
            tournaments: DashMap::new(),
            word_approvals: DashMap::new(),
            locks: DashMap::new(),
            breaker,
            retry,
            force_unavailable: AtomicBool::new(false),
            version_counter: AtomicU64::new(0),
        }
    }

    /// Test-only: simulate the backing store going away entirely.
    pub fn set_force_unavailable(&self, unavailable: bool) {
        self.force_unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn key(&self, kind: &str, id: &str) -> String {
        format!("{}:{}:{}:{}", self.config.namespace, self.config.version, kind, id)
    }

    fn jittered_ttl(&self, base: Duration) -> Duration {
        let jitter_frac = self.config.ttl_jitter_percent / 100.0;
        let jitter_span = (base.as_secs_f64() * jitter_frac).max(0.0);
        let offset = fastrand::f64() * 2.0 * jitter_span - jitter_span;
        let secs = (base.as_secs_f64() + offset).max(0.0);
        Duration::from_secs_f64(secs)
    }

    async fn write_kind(
        &self,
        map: &DashMap<String, StoredValue>,
        kind: &str,
        id: &str,
        bytes: Vec<u8>,
        ttl: Duration,
    ) -> Result<PersistOutcome> {
        if self.force_unavailable.load(Ordering::SeqCst) {
            warn!(kind, id, "persistence mirror unavailable, writing locally only");
            return Ok(PersistOutcome::Degraded);
        }

        let key = self.key(kind, id);
        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.jittered_ttl(ttl)).unwrap_or_else(|_| chrono::Duration::seconds(60));

        let breaker_result: Result<()> = self
            .breaker
            .call(async {
                self.retry
                    .execute("persistence_write", || async {
                        let version = self.version_counter.fetch_add(1, Ordering::SeqCst);
                        map.insert(
                            key.clone(),
                            StoredValue {
                                bytes: bytes.clone(),
                                expires_at,
                                version,
                            },
                        );
                        Ok::<(), anyhow::Error>(())
                    })
                    .await
            })
            .await;

        match breaker_result {
            Ok(()) => Ok(PersistOutcome::Persisted),
            Err(err) => {
                warn!(kind, id, error = %err, "persistence write degraded, continuing with local truth");
                Ok(PersistOutcome::Degraded)
            }
        }
    }

    fn read_kind(&self, map: &DashMap<String, StoredValue>, kind: &str, id: &str) -> Option<Vec<u8>> {
        if self.force_unavailable.load(Ordering::SeqCst) {
            return None;
        }
        let key = self.key(kind, id);
        let entry = map.get(&key)?;
        if entry.expires_at <= Utc::now() {
            drop(entry);
            map.remove(&key);
            return None;
        }
        Some(entry.bytes.clone())
    }

    async fn delete_kind(&self, map: &DashMap<String, StoredValue>, kind: &str, id: &str) -> Result<PersistOutcome> {
        if self.force_unavailable.load(Ordering::SeqCst) {
            return Ok(PersistOutcome::Degraded);
        }
        let key = self.key(kind, id);
        map.remove(&key);
        Ok(PersistOutcome::Persisted)
    }

    /// Cursor-style bounded scan over a kind's keyspace (§4.4 "scans use
    /// cursor iteration with a bounded maximum").
    fn list_kind(&self, map: &DashMap<String, StoredValue>, kind: &str) -> Vec<String> {
        let prefix = format!("{}:{}:{}:", self.config.namespace, self.config.version, kind);
        let now = Utc::now();
        let mut out = Vec::new();
        for entry in map.iter() {
            if out.len() >= self.config.scan_cursor_max {
                break;
            }
            if entry.expires_at <= now {
                continue;
            }
            if let Some(id) = entry.key().strip_prefix(&prefix) {
                out.push(id.to_string());
            }
        }
        out
    }
}

#[async_trait]
impl PersistenceMirror for InMemoryPersistenceMirror {
    async fn save_room(&self, code: &RoomCode, snapshot: &Room) -> Result<PersistOutcome> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.write_kind(&self.rooms, "room", code, bytes, self.config.room_ttl)
            .await
    }

    async fn load_room(&self, code: &RoomCode) -> Result<Option<Room>> {
        let Some(bytes) = self.read_kind(&self.rooms, "room", code) else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn delete_room(&self, code: &RoomCode) -> Result<PersistOutcome> {
        self.delete_kind(&self.rooms, "room", code).await
    }

    async fn list_room_codes(&self) -> Result<Vec<RoomCode>> {
        Ok(self.list_kind(&self.rooms, "room"))
    }

    async fn save_tournament(&self, id: &str, snapshot: &TournamentSnapshot) -> Result<PersistOutcome> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.write_kind(&self.tournaments, "tournament", id, bytes, self.config.tournament_ttl)
            .await
    }

    async fn load_tournament(&self, id: &str) -> Result<Option<TournamentSnapshot>> {
        let Some(bytes) = self.read_kind(&self.tournaments, "tournament", id) else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn delete_tournament(&self, id: &str) -> Result<PersistOutcome> {
        self.delete_kind(&self.tournaments, "tournament", id).await
    }

    async fn list_tournament_ids(&self) -> Result<Vec<String>> {
        Ok(self.list_kind(&self.tournaments, "tournament"))
    }

    async fn acquire_room_lock(&self, code: &RoomCode, holder_id: &str, ttl: Duration) -> Result<()> {
        let key = self.key("lock:game", code);
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let now = Utc::now();
            let acquired = match self.locks.entry(key.clone()) {
                dashmap::mapref::entry::Entry::Occupied(existing) if existing.get().expires_at > now => false,
                dashmap::mapref::entry::Entry::Occupied(mut existing) => {
                    existing.insert(LockEntry {
                        holder_id: holder_id.to_string(),
                        expires_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
                    });
                    true
                }
                dashmap::mapref::entry::Entry::Vacant(vacant) => {
                    vacant.insert(LockEntry {
                        holder_id: holder_id.to_string(),
                        expires_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
                    });
                    true
                }
            };

            if acquired {
                return Ok(());
            }
            if attempts >= self.config.lock_acquire_max_retries {
                return Err(anyhow!(LockError::BudgetExhausted(code.clone())));
            }
            tokio::time::sleep(self.config.lock_acquire_retry_delay).await;
        }
    }

    async fn release_room_lock(&self, code: &RoomCode, holder_id: &str) -> Result<bool> {
        let key = self.key("lock:game", code);
        if let Some(entry) = self.locks.get(&key) {
            if entry.holder_id == holder_id {
                drop(entry);
                self.locks.remove(&key);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn extend_room_lock(&self, code: &RoomCode, holder_id: &str, ttl: Duration) -> Result<bool> {
        let key = self.key("lock:game", code);
        if let Some(mut entry) = self.locks.get_mut(&key) {
            if entry.holder_id == holder_id {
                entry.expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn record_word_approval(
        &self,
        normalized_word: &str,
        game_id: &str,
    ) -> Result<WordApprovalCounter> {
        let key = self.key("wordapproval", normalized_word);
        let max_attempts = 5;
        for _ in 0..max_attempts {
            let (mut counter, seen_version) = match self.word_approvals.get(&key) {
                Some(entry) => (
                    serde_json::from_slice::<WordApprovalCounter>(&entry.bytes)?,
                    Some(entry.version),
                ),
                None => (WordApprovalCounter::default(), None),
            };

            counter.approval_count += 1;
            counter.game_ids.push(game_id.to_string());
            let now = Utc::now();
            counter.first_approved.get_or_insert(now);
            counter.last_approved = Some(now);

            let bytes = serde_json::to_vec(&counter)?;
            let next_version = self.version_counter.fetch_add(1, Ordering::SeqCst);

            // Watch/commit: only succeeds if nobody else wrote between our
            // read and this commit (§4.4 optimistic transactional update).
            let committed = match self.word_approvals.entry(key.clone()) {
                dashmap::mapref::entry::Entry::Occupied(mut existing) => {
                    if Some(existing.get().version) == seen_version {
                        existing.insert(StoredValue {
                            bytes,
                            expires_at: now + chrono::Duration::seconds(self.config.room_ttl.as_secs() as i64),
                            version: next_version,
                        });
                        true
                    } else {
                        false
                    }
                }
                dashmap::mapref::entry::Entry::Vacant(vacant) if seen_version.is_none() => {
                    vacant.insert(StoredValue {
                        bytes,
                        expires_at: now + chrono::Duration::seconds(self.config.room_ttl.as_secs() as i64),
                        version: next_version,
                    });
                    true
                }
                _ => false,
            };

            if committed {
                return Ok(counter);
            }
        }
        Err(anyhow!("word approval commit conflict exceeded retry budget for {normalized_word}"))
    }

    async fn is_degraded(&self) -> bool {
        self.force_unavailable.load(Ordering::SeqCst)
            || matches!(self.breaker.get_state().await, crate::distributed::CircuitState::Open)
    }
}
