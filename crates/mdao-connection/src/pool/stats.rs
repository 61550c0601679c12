//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStats {
    /// Number of open connections (idle + active)
    total: usize,
    /// Connections sitting in the free list
    idle: usize,
    /// Connections currently checked out
    active: usize,
    /// Callers blocked waiting for a connection
    waiting: usize,
    /// Connection limit, 0 when unbounded
    max_size: usize,
}

impl PoolStats {
    pub fn new(idle: usize, active: usize, waiting: usize, max_size: usize) -> Self {
        Self {
            total: idle + active,
            idle,
            active,
            waiting,
            max_size,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn idle(&self) -> usize {
        self.idle
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn waiting(&self) -> usize {
        self.waiting
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Share of the capacity in use (0.0 to 1.0).
    ///
    /// Unbounded pools are measured against their open connections instead
    /// of a limit. Returns 0.0 for an empty pool.
    pub fn utilization(&self) -> f64 {
        let capacity = if self.max_size > 0 {
            self.max_size
        } else {
            self.total
        };
        if capacity == 0 {
            0.0
        } else {
            self.active as f64 / capacity as f64
        }
    }

    /// Whether the next acquire would have to wait
    pub fn is_full(&self) -> bool {
        self.max_size > 0 && self.idle == 0 && self.active >= self.max_size
    }
}
