//! Bounded connection pools
//!
//! A pool hands out connections for a single URL, creating them on demand up
//! to its limit and blocking callers once the limit is reached.
//!
//! # Example
//!
//! ```ignore
//! use mdao_connection::pool::{ConnectionPool, PoolConfig};
//!
//! let config = PoolConfig::new("main", 5).with_acquire_timeout_ms(5000);
//! let pool = ConnectionPool::new(config, connection_factory);
//!
//! let conn = pool.get()?;
//! conn.execute("DELETE FROM sessions", &[])?;
//! pool.release(conn);
//! ```

mod config;
mod pool;
mod stats;


pub use config::{DEFAULT_ACQUIRE_TIMEOUT_MS, PoolConfig};
pub use pool::{ConnectionFactory, ConnectionPool, DriverConnectionFactory, PooledConnection};
pub use stats::PoolStats;
