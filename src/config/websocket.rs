//! WebSocket transport configuration types.

use super::defaults::default_max_frame_bytes;
use serde::{Deserialize, Serialize};

/// WebSocket configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebSocketConfig {
    /// Largest text frame accepted from a client, in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl WebSocketConfig {
    /// Validate WebSocket configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_frame_bytes == 0 {
            anyhow::bail!("websocket.max_frame_bytes must be greater than zero");
        }
        Ok(())
    }
}
