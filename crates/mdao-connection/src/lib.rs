//! mdao Connection - Named connection pools behind a single manager
//!
//! This crate reads the database configuration, registers the configured
//! drivers and keeps one bounded [`ConnectionPool`] per configured pool name.
//! Callers borrow connections by pool name from the [`ConnectionManager`] and
//! hand them back when done.

mod config;
mod manager;
pub mod pool;

pub use config::{
    CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE, DEFAULT_MAX_CONNECTIONS, DatabaseProperties,
    PoolDefinition,
};
pub use manager::{ConnectionManager, DEFAULT_ACQUIRE_TIMEOUT};
pub use pool::{
    ConnectionFactory, ConnectionPool, DriverConnectionFactory, PoolConfig, PoolStats,
    PooledConnection,
};

pub use mdao_core::{Connection, Credentials, MdaoError, Result};
