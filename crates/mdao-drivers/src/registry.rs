//! Driver registry for managing available database drivers
//!
//! The registry separates drivers the process *knows about* (the catalog:
//! built-ins plus anything provided programmatically) from drivers that have
//! been *registered* from configuration. Only registered drivers are asked to
//! open connections, and shutting down a connection manager deregisters them
//! again.

use mdao_core::{Connection, Credentials, DatabaseDriver, MdaoError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available database drivers
pub struct DriverRegistry {
    catalog: HashMap<String, Arc<dyn DatabaseDriver>>,
    registered: RwLock<Vec<Arc<dyn DatabaseDriver>>>,
}

impl DriverRegistry {
    /// Create a new registry with an empty catalog
    pub fn new() -> Self {
        Self {
            catalog: HashMap::new(),
            registered: RwLock::new(Vec::new()),
        }
    }

    /// Create a registry whose catalog holds all built-in drivers.
    ///
    /// Nothing is registered yet; use [`DriverRegistry::load_drivers`] or
    /// [`DriverRegistry::register`].
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "sqlite")]
        registry.provide(Arc::new(crate::sqlite::SqliteDriver::new()));

        registry
    }

    /// Add a driver to the catalog so configuration can register it by id
    pub fn provide(&mut self, driver: Arc<dyn DatabaseDriver>) {
        let id = driver.id().to_string();
        tracing::debug!(driver = %id, "driver available");
        self.catalog.insert(id, driver);
    }

    /// Builder form of [`DriverRegistry::provide`]
    pub fn with_driver(mut self, driver: Arc<dyn DatabaseDriver>) -> Self {
        self.provide(driver);
        self
    }

    /// Register a catalog driver by identifier.
    ///
    /// Registering an already registered driver is a no-op.
    pub fn register(&self, id: &str) -> Result<()> {
        let driver = self.catalog.get(id).cloned().ok_or_else(|| {
            MdaoError::Driver(format!("Unknown driver identifier: {}", id))
        })?;

        let mut registered = self.registered.write();
        if registered.iter().any(|d| d.id() == id) {
            tracing::debug!(driver = %id, "driver already registered");
            return Ok(());
        }
        registered.push(driver);
        tracing::info!(driver = %id, "registering database driver");
        Ok(())
    }

    /// Register every identifier in a whitespace-separated list.
    ///
    /// Each identifier is registered independently: a failure is logged and
    /// the remaining identifiers are still tried. Returns the number of
    /// identifiers that ended up registered.
    pub fn load_drivers(&self, list: &str) -> usize {
        let mut loaded = 0;
        for id in list.split_whitespace() {
            match self.register(id) {
                Ok(()) => loaded += 1,
                Err(e) => {
                    tracing::error!(driver = %id, error = %e, "driver registration failed");
                }
            }
        }
        if loaded == 0 {
            tracing::warn!("no database drivers registered");
        }
        loaded
    }

    /// Deregister a single driver
    pub fn deregister(&self, id: &str) -> Result<()> {
        let mut registered = self.registered.write();
        let position = registered
            .iter()
            .position(|d| d.id() == id)
            .ok_or_else(|| MdaoError::Driver(format!("Driver not registered: {}", id)))?;
        registered.remove(position);
        tracing::info!(driver = %id, "deregistered database driver");
        Ok(())
    }

    /// Deregister every registered driver, returning how many were removed.
    ///
    /// Best-effort: a failure for one driver is logged and does not stop the
    /// loop.
    pub fn unregister_all(&self) -> usize {
        let ids = self.registered();
        let mut removed = 0;
        for id in ids {
            match self.deregister(id) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(driver = %id, error = %e, "could not deregister driver");
                }
            }
        }
        removed
    }

    /// Identifiers of the registered drivers, in registration order
    pub fn registered(&self) -> Vec<&'static str> {
        self.registered.read().iter().map(|d| d.id()).collect()
    }

    /// Check if a driver is registered
    pub fn is_registered(&self, id: &str) -> bool {
        self.registered.read().iter().any(|d| d.id() == id)
    }

    /// Identifiers in the catalog
    pub fn available(&self) -> Vec<&str> {
        self.catalog.keys().map(|s| s.as_str()).collect()
    }

    /// Get a registered driver by identifier
    pub fn get(&self, id: &str) -> Option<Arc<dyn DatabaseDriver>> {
        let driver = self.registered.read().iter().find(|d| d.id() == id).cloned();
        if driver.is_none() {
            tracing::warn!(driver = %id, "driver not found in registry");
        }
        driver
    }

    /// Open a connection with the first registered driver that accepts `url`
    pub fn connect(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Box<dyn Connection>> {
        let driver = self
            .registered
            .read()
            .iter()
            .find(|d| d.accepts_url(url))
            .cloned()
            .ok_or_else(|| MdaoError::Driver(format!("No suitable driver found for {}", url)))?;

        driver.connect(url, credentials)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("available", &self.available())
            .field("registered", &self.registered())
            .finish()
    }
}
