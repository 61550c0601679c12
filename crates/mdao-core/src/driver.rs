//! Database driver trait definition

use crate::{Connection, Result};

/// User name and password presented when opening a connection
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username
    pub user: String,
    /// Password (may be empty)
    pub password: String,
}

impl Credentials {
    /// Create credentials from a user and password
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Build credentials from optional configuration values.
    ///
    /// Returns `None` when no user is configured or the user is empty, in which
    /// case drivers connect without credentials. A missing password with a
    /// present user becomes an empty password.
    pub fn from_parts(user: Option<&str>, password: Option<&str>) -> Option<Self> {
        match user {
            Some(user) if !user.is_empty() => {
                Some(Self::new(user, password.unwrap_or_default()))
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Core driver trait that all database drivers must implement
///
/// A driver knows how to open connections for the URLs it accepts. Drivers are
/// made available to pools through the driver registry; a pool never talks to
/// a driver that has not been registered.
pub trait DatabaseDriver: Send + Sync {
    /// Unique identifier used in configuration (e.g., "sqlite")
    fn id(&self) -> &'static str {
        self.name()
    }

    /// Human-readable name (e.g., "SQLite")
    fn name(&self) -> &'static str;

    /// Whether this driver can open a connection for `url`
    fn accepts_url(&self, url: &str) -> bool;

    /// Open a new connection
    fn connect(&self, url: &str, credentials: Option<&Credentials>)
    -> Result<Box<dyn Connection>>;

    /// Open a connection and close it again
    fn test_connection(&self, url: &str, credentials: Option<&Credentials>) -> Result<()> {
        tracing::debug!(driver = %self.id(), "testing connection");
        let conn = self.connect(url, credentials)?;
        conn.close()
    }
}
