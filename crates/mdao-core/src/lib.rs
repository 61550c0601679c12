//! mdao Core - Core abstractions shared by the connection pool and its drivers
//!
//! This crate provides the fundamental traits and types that all other
//! mdao crates depend on. It defines:
//!
//! - `DatabaseDriver` - Trait for database driver implementations
//! - `Connection` - Trait for a single, synchronous database connection
//! - `Credentials` - Optional user/password pair used when connecting
//! - Common types like `Value`, `Row` and `QueryResult`

mod connection;
mod driver;
mod error;
mod types;

pub use connection::*;
pub use driver::*;
pub use error::*;
pub use types::*;
