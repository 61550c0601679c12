//! Database configuration
//!
//! The configuration is a flat set of string keys read from a TOML document.
//! Nested tables flatten into dotted keys, so these two documents describe
//! the same pool:
//!
//! ```toml
//! driver = "sqlite"
//!
//! [main]
//! url = "sqlite:data/app.db"
//! maxconn = 5
//! ```
//!
//! ```toml
//! driver = "sqlite"
//! main.url = "sqlite:data/app.db"
//! main.maxconn = "5"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mdao_core::{Credentials, MdaoError, Result};

use crate::pool::PoolConfig;

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "MDAO_DATABASE_CONFIG";

/// File name looked up in the working directory and the user config dir
pub const DEFAULT_CONFIG_FILE: &str = "database.toml";

/// Connection limit used when a pool does not set `maxconn`
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

const DRIVER_KEY: &str = "driver";
const URL_SUFFIX: &str = "url";

/// Flattened key/value database configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseProperties {
    entries: BTreeMap<String, String>,
}

impl DatabaseProperties {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from key/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse a TOML document
    pub fn parse_toml(source: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(source)?;
        let mut entries = BTreeMap::new();
        flatten_table(None, &table, &mut entries);
        Ok(Self { entries })
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading database configuration");
        let source = std::fs::read_to_string(path)?;
        Self::parse_toml(&source)
    }

    /// Load the configuration from the first location that exists:
    /// `$MDAO_DATABASE_CONFIG`, `./database.toml`, then
    /// `<config dir>/mdao/database.toml`.
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path().ok_or_else(|| {
            MdaoError::Configuration(format!(
                "no {} found (set {} to point at one)",
                DEFAULT_CONFIG_FILE, CONFIG_ENV_VAR
            ))
        })?;
        Self::load(path)
    }

    /// Resolve the configuration file used by [`DatabaseProperties::load_default`]
    ///
    /// A path given through the environment is returned even if it does not
    /// exist, so the read error names the file the user asked for.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR)
            && !path.is_empty()
        {
            return Some(PathBuf::from(path));
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }

        dirs::config_dir()
            .map(|dir| dir.join("mdao").join(DEFAULT_CONFIG_FILE))
            .filter(|path| path.is_file())
    }

    /// Look up a raw value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// The whitespace-separated driver list (empty when not configured)
    pub fn driver_list(&self) -> &str {
        self.get(DRIVER_KEY).unwrap_or_default()
    }

    /// One definition per `<name>.url` key, ordered by pool name.
    ///
    /// Pools whose URL is empty are skipped with an error in the log.
    pub fn pool_definitions(&self) -> Vec<PoolDefinition> {
        self.entries
            .iter()
            .filter_map(|(key, url)| {
                let (name, suffix) = key.rsplit_once('.')?;
                (suffix == URL_SUFFIX && !name.is_empty()).then_some((name, url))
            })
            .filter_map(|(name, url)| {
                let url = url.trim();
                if url.is_empty() {
                    tracing::error!(pool = %name, "pool has an empty url, skipping");
                    return None;
                }
                Some(PoolDefinition {
                    name: name.to_string(),
                    url: url.to_string(),
                    user: self.pool_value(name, "user"),
                    password: self.pool_value(name, "password"),
                    max_connections: self.max_connections(name),
                })
            })
            .collect()
    }

    fn pool_value(&self, pool: &str, key: &str) -> Option<String> {
        self.get(&format!("{}.{}", pool, key))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn max_connections(&self, pool: &str) -> u32 {
        match self.get(&format!("{}.maxconn", pool)) {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => parse_max_connections(pool, raw),
        }
    }
}

/// A pool described by the configuration
#[derive(Clone, PartialEq, Eq)]
pub struct PoolDefinition {
    pub name: String,
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Connection limit, `0` meaning unbounded
    pub max_connections: u32,
}

impl PoolDefinition {
    /// Credentials to connect with, if a user is configured
    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::from_parts(self.user.as_deref(), self.password.as_deref())
    }

    /// Pool configuration for this definition
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new(&self.name, self.max_connections as usize)
    }
}

impl std::fmt::Debug for PoolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolDefinition")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Non-numeric and negative values fall back to `0`, which leaves the pool
/// unbounded. Values beyond `u32::MAX` are clamped.
fn parse_max_connections(pool: &str, raw: &str) -> u32 {
    match raw.trim().parse::<i64>() {
        Ok(max) if max < 0 => {
            tracing::error!(
                pool = %pool,
                value = max,
                "negative maxconn, pool will not limit connections"
            );
            0
        }
        Ok(max) => u32::try_from(max).unwrap_or(u32::MAX),
        Err(e) => {
            tracing::error!(
                pool = %pool,
                value = %raw,
                error = %e,
                "invalid maxconn, pool will not limit connections"
            );
            0
        }
    }
}

fn flatten_table(
    prefix: Option<&str>,
    table: &toml::Table,
    entries: &mut BTreeMap<String, String>,
) {
    for (key, value) in table {
        let key = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.clone(),
        };
        match value {
            toml::Value::Table(nested) => flatten_table(Some(&key), nested, entries),
            other => {
                entries.insert(key, render_value(other));
            }
        }
    }
}

fn render_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nested_and_dotted_keys_are_equivalent() {
        let nested = DatabaseProperties::parse_toml(
            r#"
            driver = "sqlite"

            [main]
            url = "sqlite::memory:"
            maxconn = 5
            "#,
        )
        .expect("parse nested");

        let dotted = DatabaseProperties::parse_toml(
            r#"
            driver = "sqlite"
            main.url = "sqlite::memory:"
            main.maxconn = "5"
            "#,
        )
        .expect("parse dotted");

        assert_eq!(nested, dotted);
        assert_eq!(nested.get("main.maxconn"), Some("5"));
    }

    #[test]
    fn test_driver_array_joins_with_spaces() {
        let props = DatabaseProperties::parse_toml(r#"driver = ["sqlite", "postgres"]"#)
            .expect("parse");
        assert_eq!(props.driver_list(), "sqlite postgres");
        assert_eq!(DatabaseProperties::new().driver_list(), "");
    }

    #[test]
    fn test_pool_definitions() {
        let props = DatabaseProperties::from_pairs([
            ("driver", "sqlite"),
            ("main.url", "sqlite:main.db"),
            ("main.user", "app"),
            ("main.password", "secret"),
            ("main.maxconn", "3"),
            ("reports.url", "sqlite:reports.db"),
            ("reports.user", ""),
            ("orphan.user", "nobody"),
        ]);

        let defs = props.pool_definitions();
        assert_eq!(defs.len(), 2);

        let main = &defs[0];
        assert_eq!(main.name, "main");
        assert_eq!(main.max_connections, 3);
        assert_eq!(main.credentials(), Some(Credentials::new("app", "secret")));

        let reports = &defs[1];
        assert_eq!(reports.name, "reports");
        assert_eq!(reports.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(reports.credentials(), None);
    }

    #[test]
    fn test_invalid_maxconn_means_unbounded() {
        let props = DatabaseProperties::from_pairs([
            ("a.url", "sqlite::memory:"),
            ("a.maxconn", "abc"),
            ("b.url", "sqlite::memory:"),
            ("b.maxconn", "-1"),
            ("c.url", "sqlite::memory:"),
            ("c.maxconn", " 7 "),
            ("d.url", "sqlite::memory:"),
            ("d.maxconn", "99999999999"),
        ]);

        let limits: Vec<_> = props
            .pool_definitions()
            .iter()
            .map(|d| (d.name.clone(), d.max_connections))
            .collect();
        assert_eq!(
            limits,
            vec![
                ("a".to_string(), 0),
                // Negative limits are rejected rather than producing a pool
                // that can never connect
                ("b".to_string(), 0),
                ("c".to_string(), 7),
                ("d".to_string(), u32::MAX),
            ]
        );
        assert!(!props.pool_definitions()[0].pool_config().is_bounded());
    }

    #[test]
    fn test_empty_url_is_skipped() {
        let props = DatabaseProperties::from_pairs([("blank.url", "  "), ("url", "x")]);
        assert!(props.pool_definitions().is_empty());
    }

    #[test]
    fn test_definition_debug_redacts_password() {
        let props = DatabaseProperties::from_pairs([
            ("main.url", "sqlite::memory:"),
            ("main.user", "app"),
            ("main.password", "hunter2"),
        ]);
        let debug = format!("{:?}", props.pool_definitions()[0]);
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_load_reports_missing_file_and_bad_toml() {
        let dir = tempfile::tempdir().expect("tempdir");

        let err = DatabaseProperties::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, MdaoError::Io(_)));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "main.url = ").expect("write");
        let err = DatabaseProperties::load(&bad).unwrap_err();
        assert!(matches!(err, MdaoError::Toml(_)));
    }
}
