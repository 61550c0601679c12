//! Pool configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Acquire budget used by [`ConnectionPool::get`](super::ConnectionPool::get)
/// unless configured otherwise
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 30_000;

/// Configuration for a connection pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Pool name, used for routing and in log output
    name: String,
    /// Maximum number of checked-out connections, 0 for no limit
    max_size: usize,
    /// Timeout in milliseconds when acquiring a connection from the pool
    #[serde(default = "default_acquire_timeout_ms")]
    acquire_timeout_ms: u64,
}

fn default_acquire_timeout_ms() -> u64 {
    DEFAULT_ACQUIRE_TIMEOUT_MS
}

impl PoolConfig {
    /// Create a pool configuration. A `max_size` of 0 leaves the pool unbounded.
    pub fn new(name: impl Into<String>, max_size: usize) -> Self {
        Self {
            name: name.into(),
            max_size,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
        }
    }

    /// Set the acquire timeout in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the maximum pool size (0 when unbounded)
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Whether the pool enforces a connection limit
    pub fn is_bounded(&self) -> bool {
        self.max_size > 0
    }

    /// Get the acquire timeout as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for PoolConfig {
    /// Pool named `default` holding at most 10 connections, 30 second
    /// acquire timeout
    fn default() -> Self {
        Self::new("default", 10)
    }
}
