//! Connection manager routing requests to named pools

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use mdao_core::{MdaoError, Result};
use mdao_drivers::DriverRegistry;

use crate::config::DatabaseProperties;
use crate::pool::{
    ConnectionPool, DEFAULT_ACQUIRE_TIMEOUT_MS, DriverConnectionFactory, PoolStats,
    PooledConnection,
};

#[cfg(test)]
mod tests;

/// Budget used by [`ConnectionManager::get_connection`]
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_millis(DEFAULT_ACQUIRE_TIMEOUT_MS);

static GLOBAL: OnceLock<ConnectionManager> = OnceLock::new();

/// Owns the configured pools and the drivers they connect through
///
/// The set of pools is fixed at construction. Build one explicitly with
/// [`ConnectionManager::new`] and pass it around, or use the lazily
/// configured process-wide instance from [`ConnectionManager::global`].
pub struct ConnectionManager {
    pools: HashMap<String, ConnectionPool>,
    drivers: Arc<DriverRegistry>,
}

impl ConnectionManager {
    /// Build a manager using the built-in drivers
    pub fn new(properties: &DatabaseProperties) -> Self {
        Self::with_registry(properties, DriverRegistry::with_defaults())
    }

    /// Build a manager, registering the configured drivers from `registry`
    pub fn with_registry(properties: &DatabaseProperties, registry: DriverRegistry) -> Self {
        registry.load_drivers(properties.driver_list());
        let drivers = Arc::new(registry);

        let mut pools = HashMap::new();
        for definition in properties.pool_definitions() {
            let factory = DriverConnectionFactory::new(
                definition.url.clone(),
                definition.credentials(),
                drivers.clone(),
            );
            let pool = ConnectionPool::new(definition.pool_config(), factory);
            tracing::info!(
                pool = %definition.name,
                url = %definition.url,
                max_connections = definition.max_connections,
                "created connection pool"
            );
            pools.insert(definition.name, pool);
        }

        Self { pools, drivers }
    }

    /// A manager with no pools and nothing registered
    pub fn empty() -> Self {
        Self {
            pools: HashMap::new(),
            drivers: Arc::new(DriverRegistry::with_defaults()),
        }
    }

    /// The process-wide manager, configured on first use from
    /// [`DatabaseProperties::load_default`].
    ///
    /// If the configuration cannot be loaded the error is logged and the
    /// manager starts without pools.
    pub fn global() -> &'static ConnectionManager {
        GLOBAL.get_or_init(|| Self::from_load(DatabaseProperties::load_default()))
    }

    fn from_load(loaded: Result<DatabaseProperties>) -> Self {
        match loaded {
            Ok(properties) => Self::new(&properties),
            Err(e) => {
                tracing::error!(error = %e, "cannot load database configuration");
                Self::empty()
            }
        }
    }

    /// Make this manager the process-wide instance.
    ///
    /// Fails, giving the manager back, if the global instance already exists.
    pub fn install(self) -> std::result::Result<&'static ConnectionManager, ConnectionManager> {
        GLOBAL.set(self)?;
        Ok(Self::global())
    }

    /// Get a connection from `pool`, waiting up to 30 seconds
    pub fn get_connection(&self, pool: &str) -> Result<PooledConnection> {
        self.get_connection_timeout(pool, DEFAULT_ACQUIRE_TIMEOUT)
    }

    /// Get a connection from `pool`, waiting up to `timeout`.
    ///
    /// An unknown pool name fails immediately.
    #[tracing::instrument(skip(self), fields(timeout_ms = timeout.as_millis() as u64))]
    pub fn get_connection_timeout(
        &self,
        pool: &str,
        timeout: Duration,
    ) -> Result<PooledConnection> {
        self.lookup(pool)?.get_timeout(timeout)
    }

    /// Return a connection to `pool`
    #[tracing::instrument(skip(self, connection), fields(connection_id = connection.id()))]
    pub fn free_connection(&self, pool: &str, connection: PooledConnection) -> Result<()> {
        // An unknown name still drops the handle, returning it to its own pool.
        self.lookup(pool)?.release(connection);
        Ok(())
    }

    /// Shut down every pool, then deregister the drivers
    pub fn release(&self) {
        tracing::info!(pools = self.pools.len(), "releasing connection manager");
        for pool in self.pools.values() {
            pool.shutdown();
        }
        let deregistered = self.drivers.unregister_all();
        tracing::info!(drivers = deregistered, "connection manager released");
    }

    pub fn pool(&self, name: &str) -> Option<&ConnectionPool> {
        self.pools.get(name)
    }

    /// Names of the configured pools, sorted
    pub fn pool_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.pools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn stats(&self, pool: &str) -> Option<PoolStats> {
        self.pools.get(pool).map(ConnectionPool::stats)
    }

    /// Get the driver registry
    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    fn lookup(&self, name: &str) -> Result<&ConnectionPool> {
        self.pools.get(name).ok_or_else(|| {
            tracing::warn!(pool = %name, "unknown connection pool");
            MdaoError::UnknownPool(name.to_string())
        })
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("pools", &self.pool_names())
            .field("drivers", &self.drivers)
            .finish()
    }
}
