//! Connection trait

use crate::{QueryResult, Result, StatementResult, Value};

/// A database connection
///
/// Connections are synchronous: every call blocks the calling thread until the
/// driver answers. A connection is used by one caller at a time, but it is
/// moved between threads as it travels through a pool, hence `Send + Sync`.
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite")
    fn driver_name(&self) -> &str;

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE/DDL)
    fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT)
    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Close the connection
    ///
    /// Closing an already closed connection is a no-op.
    fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    ///
    /// This must not perform a round trip to the server; pools call it while
    /// holding their lock.
    fn is_closed(&self) -> bool;
}

impl std::fmt::Debug for dyn Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("driver", &self.driver_name())
            .field("closed", &self.is_closed())
            .finish()
    }
}
