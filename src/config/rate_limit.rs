//! Rate limiting configuration: a per-connection weighted operation budget
//! (§4.1, §6). Each inbound message costs its operation's weight against a
//! rolling window budget; exhausting the budget drops the message and emits
//! a `rateLimited` signal rather than disconnecting the client.

use super::defaults::{
    default_rate_limit_budget_per_window, default_rate_limit_room_creations_per_window,
    default_rate_limit_window_secs, default_rate_weight_chat, default_rate_weight_default,
    default_rate_weight_submit_word,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    /// Rolling window length (seconds)
    #[serde(default = "default_rate_limit_window_secs")]
    pub window_secs: u64,
    /// Total weighted budget available per connection per window
    #[serde(default = "default_rate_limit_budget_per_window")]
    pub budget_per_window: u32,
    /// Weight charged for `submitWord` (`RATE_WEIGHT_SUBMITWORD`)
    #[serde(default = "default_rate_weight_submit_word")]
    pub weight_submit_word: u32,
    /// Weight charged for `chat` (`RATE_WEIGHT_CHAT`)
    #[serde(default = "default_rate_weight_chat")]
    pub weight_chat: u32,
    /// Weight charged for any operation with no specific entry
    #[serde(default = "default_rate_weight_default")]
    pub weight_default: u32,
    /// Separate budget: room creations allowed per window, per connection
    #[serde(default = "default_rate_limit_room_creations_per_window")]
    pub room_creations_per_window: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_rate_limit_window_secs(),
            budget_per_window: default_rate_limit_budget_per_window(),
            weight_submit_word: default_rate_weight_submit_word(),
            weight_chat: default_rate_weight_chat(),
            weight_default: default_rate_weight_default(),
            room_creations_per_window: default_rate_limit_room_creations_per_window(),
        }
    }
}

impl RateLimitConfig {
    /// Weight charged for a given client message action name (§6 wire
    /// actions). Unrecognized actions fall back to `weight_default`.
    #[must_use]
    pub fn weight_for_action(&self, action: &str) -> u32 {
        match action {
            "submitWord" => self.weight_submit_word,
            "chat" => self.weight_chat,
            _ => self.weight_default,
        }
    }
}
