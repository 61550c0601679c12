//! mdao Drivers - Database driver implementations
//!
//! This crate provides the driver registry the connection pools open their
//! connections through, and re-exports the concrete drivers enabled by cargo
//! features.

#[cfg(feature = "sqlite")]
pub use mdao_driver_sqlite as sqlite;

mod registry;

pub use registry::DriverRegistry;

/// Re-export commonly used types from mdao-core
pub use mdao_core::{
    Connection, Credentials, DatabaseDriver, MdaoError, QueryResult, Result, Row,
    StatementResult, Value,
};
