//! Connection pool implementation

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use mdao_core::{Connection, Credentials, MdaoError, Result};
use mdao_drivers::DriverRegistry;
use parking_lot::{Condvar, Mutex};

use super::config::PoolConfig;
use super::stats::PoolStats;

/// Factory trait for creating new connections
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Create a new connection
    fn create(&self) -> Result<Box<dyn Connection>>;

    /// Validate that an idle connection is still usable.
    ///
    /// Called under the pool lock, so it must not touch the network.
    fn validate(&self, conn: &dyn Connection) -> bool {
        !conn.is_closed()
    }
}

impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    fn create(&self) -> Result<Box<dyn Connection>> {
        (**self).create()
    }

    fn validate(&self, conn: &dyn Connection) -> bool {
        (**self).validate(conn)
    }
}

/// Opens connections through the registered drivers
pub struct DriverConnectionFactory {
    url: String,
    credentials: Option<Credentials>,
    drivers: Arc<DriverRegistry>,
}

impl DriverConnectionFactory {
    pub fn new(
        url: impl Into<String>,
        credentials: Option<Credentials>,
        drivers: Arc<DriverRegistry>,
    ) -> Self {
        Self {
            url: url.into(),
            credentials,
            drivers,
        }
    }
}

impl ConnectionFactory for DriverConnectionFactory {
    fn create(&self) -> Result<Box<dyn Connection>> {
        self.drivers.connect(&self.url, self.credentials.as_ref())
    }
}

/// An idle connection with the id it was created under
struct IdleConnection {
    id: u64,
    connection: Box<dyn Connection>,
}

/// Everything guarded by the pool lock
#[derive(Default)]
struct PoolState {
    free: VecDeque<IdleConnection>,
    checked_out: usize,
    waiting: usize,
    closed: bool,
}

struct PoolShared {
    config: PoolConfig,
    factory: Box<dyn ConnectionFactory>,
    state: Mutex<PoolState>,
    available: Condvar,
    next_id: AtomicU64,
}

impl PoolShared {
    fn has_capacity(&self, state: &PoolState) -> bool {
        !state.free.is_empty()
            || !self.config.is_bounded()
            || state.checked_out < self.config.max_size()
    }

    fn closed_error(&self) -> MdaoError {
        MdaoError::PoolClosed(self.config.name().to_string())
    }

    fn return_connection(&self, id: u64, connection: Box<dyn Connection>) {
        let mut state = self.state.lock();
        state.checked_out = state.checked_out.saturating_sub(1);

        if state.closed {
            drop(state);
            match connection.close() {
                Ok(()) => tracing::debug!(
                    pool = %self.config.name(),
                    connection_id = id,
                    "closed connection released after shutdown"
                ),
                Err(e) => tracing::warn!(
                    pool = %self.config.name(),
                    connection_id = id,
                    error = %e,
                    "failed to close connection released after shutdown"
                ),
            }
            return;
        }

        state.free.push_back(IdleConnection { id, connection });
        drop(state);
        self.available.notify_one();
    }
}

enum Reservation {
    Idle(IdleConnection),
    NewSlot,
    Exhausted,
}

enum Attempt {
    Ready(PooledConnection),
    Exhausted,
    Failed(MdaoError),
    Closed,
}

/// A bounded pool of connections to one database
///
/// Connections are created lazily. Once `max_size` connections are checked
/// out, acquirers block until one is released or their timeout elapses.
/// Cloning is cheap and yields another handle to the same pool.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

impl ConnectionPool {
    /// Create a new connection pool with the given configuration and factory
    pub fn new<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                config,
                factory: Box::new(factory),
                state: Mutex::new(PoolState::default()),
                available: Condvar::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn name(&self) -> &str {
        self.shared.config.name()
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Take a connection if one is available right now.
    ///
    /// Returns `Ok(None)` when the pool is at its limit, or when creating a
    /// new connection failed (the failure is logged).
    pub fn try_get(&self) -> Result<Option<PooledConnection>> {
        match self.try_acquire() {
            Attempt::Ready(conn) => Ok(Some(conn)),
            Attempt::Exhausted | Attempt::Failed(_) => Ok(None),
            Attempt::Closed => Err(self.shared.closed_error()),
        }
    }

    /// Get a connection, waiting at most the configured acquire timeout
    pub fn get(&self) -> Result<PooledConnection> {
        self.get_timeout(self.shared.config.acquire_timeout())
    }

    /// Get a connection, waiting at most `timeout`.
    ///
    /// A zero timeout makes exactly one attempt. A failed connection attempt
    /// is treated like an exhausted pool: the caller waits for a release
    /// instead of retrying right away.
    pub fn get_timeout(&self, timeout: Duration) -> Result<PooledConnection> {
        let start = Instant::now();
        let shared = &self.shared;
        let mut last_error = None;

        loop {
            let failed = match self.try_acquire() {
                Attempt::Ready(conn) => return Ok(conn),
                Attempt::Closed => return Err(shared.closed_error()),
                Attempt::Failed(e) => {
                    last_error = Some(e);
                    true
                }
                Attempt::Exhausted => false,
            };

            let mut state = shared.state.lock();
            if state.closed {
                return Err(shared.closed_error());
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(self.timed_out(timeout, last_error));
            }

            // A release may have landed between the attempt and the lock.
            if !failed && shared.has_capacity(&state) {
                continue;
            }

            state.waiting += 1;
            let woken = !shared
                .available
                .wait_for(&mut state, timeout - elapsed)
                .timed_out();
            state.waiting -= 1;

            if state.closed {
                return Err(shared.closed_error());
            }
            if start.elapsed() >= timeout {
                // Hand on the wake-up this caller consumed but will not use.
                if woken && state.waiting > 0 && shared.has_capacity(&state) {
                    shared.available.notify_one();
                }
                return Err(self.timed_out(timeout, last_error));
            }
        }
    }

    fn timed_out(&self, timeout: Duration, last_error: Option<MdaoError>) -> MdaoError {
        let name = self.shared.config.name();
        tracing::warn!(
            pool = %name,
            timeout_ms = timeout.as_millis() as u64,
            "timed out waiting for a connection"
        );
        let mut message = format!(
            "no connection from pool '{}' within {}ms",
            name,
            timeout.as_millis()
        );
        if let Some(e) = last_error {
            message.push_str(&format!(" (last error: {})", e));
        }
        MdaoError::Timeout(message)
    }

    /// Return a connection to the pool and wake one waiter.
    ///
    /// The connection always goes back to the pool it was taken from.
    pub fn release(&self, conn: PooledConnection) {
        if !Arc::ptr_eq(&self.shared, &conn.pool) {
            tracing::warn!(
                pool = %self.name(),
                origin = %conn.pool_name(),
                "connection released to a foreign pool, returning it to its origin"
            );
        }
        drop(conn);
    }

    /// Close the pool.
    ///
    /// Idle connections are closed and waiters fail with `PoolClosed`.
    /// Connections still checked out are closed when they are released.
    pub fn shutdown(&self) {
        let shared = &self.shared;
        let (idle, outstanding) = {
            let mut state = shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let idle: Vec<_> = state.free.drain(..).collect();
            (idle, state.checked_out)
        };
        shared.available.notify_all();

        let mut closed = 0;
        for entry in idle {
            match entry.connection.close() {
                Ok(()) => closed += 1,
                Err(e) => tracing::warn!(
                    pool = %shared.config.name(),
                    connection_id = entry.id,
                    error = %e,
                    "failed to close idle connection"
                ),
            }
        }

        tracing::info!(
            pool = %shared.config.name(),
            closed,
            outstanding,
            "pool shut down"
        );
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats::new(
            state.free.len(),
            state.checked_out,
            state.waiting,
            self.shared.config.max_size(),
        )
    }

    fn try_acquire(&self) -> Attempt {
        let shared = &self.shared;
        let mut stale = Vec::new();

        let reservation = {
            let mut state = shared.state.lock();
            if state.closed {
                return Attempt::Closed;
            }

            let mut found = None;
            while let Some(entry) = state.free.pop_front() {
                if shared.factory.validate(entry.connection.as_ref()) {
                    found = Some(entry);
                    break;
                }
                stale.push(entry);
            }

            if let Some(entry) = found {
                state.checked_out += 1;
                Reservation::Idle(entry)
            } else if shared.has_capacity(&state) {
                state.checked_out += 1;
                Reservation::NewSlot
            } else {
                Reservation::Exhausted
            }
        };

        for entry in stale {
            tracing::debug!(
                pool = %shared.config.name(),
                connection_id = entry.id,
                "discarding stale connection"
            );
            if let Err(e) = entry.connection.close() {
                tracing::debug!(error = %e, "closing stale connection failed");
            }
        }

        match reservation {
            Reservation::Idle(entry) => {
                tracing::debug!(
                    pool = %shared.config.name(),
                    connection_id = entry.id,
                    "reusing idle connection"
                );
                Attempt::Ready(PooledConnection::new(entry.id, entry.connection, shared))
            }
            Reservation::NewSlot => match shared.factory.create() {
                Ok(connection) => {
                    let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        pool = %shared.config.name(),
                        connection_id = id,
                        "created new connection"
                    );
                    Attempt::Ready(PooledConnection::new(id, connection, shared))
                }
                Err(e) => {
                    {
                        let mut state = shared.state.lock();
                        state.checked_out = state.checked_out.saturating_sub(1);
                    }
                    tracing::warn!(
                        pool = %shared.config.name(),
                        error = %e,
                        "failed to create connection"
                    );
                    Attempt::Failed(e)
                }
            },
            Reservation::Exhausted => Attempt::Exhausted,
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A connection borrowed from a pool
///
/// Dropping the handle returns the connection to the pool it came from.
pub struct PooledConnection {
    id: u64,
    connection: Option<Box<dyn Connection>>,
    pool: Arc<PoolShared>,
}

impl PooledConnection {
    fn new(id: u64, connection: Box<dyn Connection>, pool: &Arc<PoolShared>) -> Self {
        Self {
            id,
            connection: Some(connection),
            pool: Arc::clone(pool),
        }
    }

    /// Id assigned when the connection was created, unique within its pool
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name of the pool this connection belongs to
    pub fn pool_name(&self) -> &str {
        self.pool.config.name()
    }
}

impl Deref for PooledConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_deref().expect("connection taken")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            self.pool.return_connection(self.id, conn);
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("pool", &self.pool_name())
            .finish()
    }
}
