//! Per-connection weighted operation budget (§4.1, §6).
//!
//! Grounded on the predecessor's `RoomRateLimiter` shape (a sliding window
//! of counters keyed by connection, with a periodic cleanup task), extended
//! from two flat counters (room creations, join attempts) into a single
//! weighted budget covering every inbound action: each message costs its
//! action's weight (`config::RateLimitConfig::weight_for_action`) against a
//! rolling per-window total. Exhausting the budget does not disconnect the
//! client — the dispatcher drops the message and emits `rateLimited`.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::protocol::ConnectionId;

/// Sliding-window budget tracker for a single connection.
#[derive(Debug, Clone)]
struct BudgetEntry {
    spent: u32,
    room_creations: u32,
    window_start: Instant,
}

impl BudgetEntry {
    fn new() -> Self {
        Self {
            spent: 0,
            room_creations: 0,
            window_start: Instant::now(),
        }
    }

    fn maybe_reset_window(&mut self, window: Duration) {
        if self.window_start.elapsed() >= window {
            self.spent = 0;
            self.room_creations = 0;
            self.window_start = Instant::now();
        }
    }

    fn time_until_reset(&self, window: Duration) -> Duration {
        window.saturating_sub(self.window_start.elapsed())
    }
}

/// Why a message was rejected by the budget check.
#[derive(Debug, Clone, Copy)]
pub enum RateLimitError {
    BudgetExceeded { retry_after: Duration },
    RoomCreationLimitExceeded { retry_after: Duration },
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BudgetExceeded { retry_after } => {
                write!(f, "rate limit budget exceeded, retry after {retry_after:?}")
            }
            Self::RoomCreationLimitExceeded { retry_after } => write!(
                f,
                "room creation limit exceeded, retry after {retry_after:?}"
            ),
        }
    }
}

impl std::error::Error for RateLimitError {}

/// Weighted, per-connection rate limiter (§4.1).
pub struct ConnectionRateLimiter {
    config: RateLimitConfig,
    entries: RwLock<HashMap<ConnectionId, BudgetEntry>>,
}

impl ConnectionRateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_secs)
    }

    /// Charges the weight of `action` against the connection's budget.
    /// Returns `Err` (and leaves the budget unspent) if the charge would
    /// exceed the window's total.
    pub async fn check(
        &self,
        connection_id: ConnectionId,
        action: &str,
    ) -> Result<(), RateLimitError> {
        let weight = self.config.weight_for_action(action);
        let window = self.window();
        let mut entries = self.entries.write().await;
        let entry = entries.entry(connection_id).or_insert_with(BudgetEntry::new);
        entry.maybe_reset_window(window);

        if entry.spent.saturating_add(weight) > self.config.budget_per_window {
            return Err(RateLimitError::BudgetExceeded {
                retry_after: entry.time_until_reset(window),
            });
        }

        entry.spent += weight;
        Ok(())
    }

    /// Separate budget: room creations allowed per window, per connection
    /// (§6 `createGame`, gated independently of the weighted budget so a
    /// connection that has spent its whole budget elsewhere can still be
    /// told specifically it is creating rooms too fast).
    pub async fn check_room_creation(
        &self,
        connection_id: ConnectionId,
    ) -> Result<(), RateLimitError> {
        let window = self.window();
        let mut entries = self.entries.write().await;
        let entry = entries.entry(connection_id).or_insert_with(BudgetEntry::new);
        entry.maybe_reset_window(window);

        if entry.room_creations >= self.config.room_creations_per_window {
            return Err(RateLimitError::RoomCreationLimitExceeded {
                retry_after: entry.time_until_reset(window),
            });
        }

        entry.room_creations += 1;
        Ok(())
    }

    /// Drops bookkeeping for a connection once it disconnects.
    pub async fn forget(&self, connection_id: ConnectionId) {
        self.entries.write().await.remove(&connection_id);
    }

    /// Removes stale entries whose window closed well in the past, so a
    /// server with high connection churn doesn't accumulate dead keys.
    pub async fn cleanup_stale(&self) {
        let stale_after = self.window() * 2;
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.window_start.elapsed() < stale_after);
    }

    /// Spawns a background task that periodically clears stale entries.
    pub fn spawn_cleanup(self: Arc<Self>) {
        let limiter = self;
        let interval = limiter.window();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                limiter.cleanup_stale().await;
            }
        });
    }
}
