//! Error types for mdao

use thiserror::Error;

/// Core error type for mdao operations
#[derive(Error, Debug)]
pub enum MdaoError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unknown pool: {0}")]
    UnknownPool(String),

    #[error("Pool closed: {0}")]
    PoolClosed(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl MdaoError {
    /// Whether the error means "no connection right now" rather than a
    /// misconfiguration. Callers usually retry these later.
    pub fn is_transient(&self) -> bool {
        matches!(self, MdaoError::Timeout(_) | MdaoError::Connection(_))
    }
}

/// Result type alias for mdao operations
pub type Result<T> = std::result::Result<T, MdaoError>;
