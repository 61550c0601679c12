//! SQLite driver implementation

use mdao_core::{Connection, Credentials, DatabaseDriver, MdaoError, Result};

use crate::SqliteConnection;

/// URL scheme handled by this driver
const URL_PREFIX: &str = "sqlite:";

/// Extract the database path from a `sqlite:` URL.
///
/// Accepted forms are `sqlite::memory:`, `sqlite:relative/or/absolute.db` and
/// `sqlite://path.db`. Returns `None` for URLs of other schemes or with an
/// empty path.
pub fn parse_sqlite_url(url: &str) -> Option<&str> {
    let rest = url.strip_prefix(URL_PREFIX)?;
    let path = rest.strip_prefix("//").unwrap_or(rest);
    if path.is_empty() { None } else { Some(path) }
}

/// SQLite database driver
pub struct SqliteDriver;

impl SqliteDriver {
    /// Create a new SQLite driver instance
    pub fn new() -> Self {
        tracing::debug!("SQLite driver initialized");
        Self
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseDriver for SqliteDriver {
    fn id(&self) -> &'static str {
        "sqlite"
    }

    fn name(&self) -> &'static str {
        "SQLite"
    }

    fn accepts_url(&self, url: &str) -> bool {
        parse_sqlite_url(url).is_some()
    }

    #[tracing::instrument(skip(self, credentials))]
    fn connect(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Box<dyn Connection>> {
        let path = parse_sqlite_url(url).ok_or_else(|| {
            MdaoError::Configuration(format!(
                "SQLite URL must look like 'sqlite:<path>' or 'sqlite::memory:', got '{}'",
                url
            ))
        })?;

        if let Some(credentials) = credentials {
            tracing::debug!(user = %credentials.user, "SQLite ignores credentials");
        }

        let conn = SqliteConnection::open(path).map_err(|e| {
            tracing::error!(error = %e, "failed to connect to SQLite database");
            e
        })?;

        tracing::info!(path = %path, "SQLite connection created");
        Ok(Box::new(conn))
    }
}
