//! Engine configuration.
//!
//! All timing constants of the synchronization engine live in `SyncConfig`.
//! Embedders construct it with `Default` and adjust through the `with_*`
//! builders; it is serde-friendly so it can be loaded from a settings file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Synchronization engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Board rows for newly created sessions.
    pub board_rows: u8,

    /// Board columns for newly created sessions.
    pub board_cols: u8,

    /// Maximum players including the Host and bots.
    pub max_players: usize,

    /// Debounce window of the mutation batcher.
    pub batch_window: Duration,

    /// Largest frame the transport accepts, in bytes.
    pub max_payload_bytes: usize,

    /// How often the Host re-announces its transport address.
    pub announce_interval: Duration,

    /// How often discovery is polled when the store cannot push changes.
    pub discovery_poll_interval: Duration,

    /// How often the Host persists its state even without changes.
    pub persist_interval: Duration,

    /// Persisted sessions older than this are ignored on resume.
    pub retention: Duration,

    /// Delay between reconnect attempts.
    pub reconnect_interval: Duration,

    /// Total time spent reconnecting before giving up.
    pub reconnect_max_wait: Duration,

    /// Seed for ids and tokens. `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            board_rows: 3,
            board_cols: 5,
            max_players: 4,
            batch_window: Duration::from_millis(500),
            max_payload_bytes: 16 * 1024,
            announce_interval: Duration::from_secs(3),
            discovery_poll_interval: Duration::from_secs(2),
            persist_interval: Duration::from_secs(5),
            retention: Duration::from_secs(24 * 60 * 60),
            reconnect_interval: Duration::from_secs(2),
            reconnect_max_wait: Duration::from_secs(30),
            seed: None,
        }
    }
}

impl SyncConfig {
    /// Set board dimensions.
    #[must_use]
    pub fn with_board(mut self, rows: u8, cols: u8) -> Self {
        self.board_rows = rows;
        self.board_cols = cols;
        self
    }

    /// Set the player cap.
    #[must_use]
    pub fn with_max_players(mut self, max: usize) -> Self {
        self.max_players = max;
        self
    }

    /// Set the batcher debounce window.
    #[must_use]
    pub fn with_batch_window(mut self, window: Duration) -> Self {
        self.batch_window = window;
        self
    }

    /// Set the transport payload limit.
    #[must_use]
    pub fn with_max_payload(mut self, bytes: usize) -> Self {
        self.max_payload_bytes = bytes;
        self
    }

    /// Set reconnect timing.
    #[must_use]
    pub fn with_reconnect(mut self, interval: Duration, max_wait: Duration) -> Self {
        self.reconnect_interval = interval;
        self.reconnect_max_wait = max_wait;
        self
    }

    /// Set the retention window for persisted sessions.
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Use a fixed seed (deterministic ids and tokens).
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
