//! Tests for the connection manager

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use mdao_core::{
    Connection, Credentials, DatabaseDriver, MdaoError, QueryResult, Result, StatementResult,
    Value,
};
use mdao_drivers::DriverRegistry;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use super::ConnectionManager;
use crate::config::DatabaseProperties;

struct MockConnection {
    closed: AtomicBool,
}

impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    fn execute(&self, _sql: &str, _params: &[Value]) -> Result<StatementResult> {
        Ok(StatementResult { affected_rows: 1 })
    }

    fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        Ok(QueryResult::empty())
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Driver for `mock:` URLs that records what it was asked to open
#[derive(Default)]
struct MockDriver {
    opened: AtomicUsize,
    credentials: Mutex<Vec<Option<Credentials>>>,
}

impl DatabaseDriver for MockDriver {
    fn id(&self) -> &'static str {
        "mock"
    }

    fn name(&self) -> &'static str {
        "Mock"
    }

    fn accepts_url(&self, url: &str) -> bool {
        url.starts_with("mock:")
    }

    fn connect(
        &self,
        _url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Box<dyn Connection>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.credentials.lock().push(credentials.cloned());
        Ok(Box::new(MockConnection {
            closed: AtomicBool::new(false),
        }))
    }
}

fn manager_with<const N: usize>(pairs: [(&str, &str); N]) -> (ConnectionManager, Arc<MockDriver>) {
    let driver = Arc::new(MockDriver::default());
    let registry = DriverRegistry::new().with_driver(driver.clone());
    let manager = ConnectionManager::with_registry(&DatabaseProperties::from_pairs(pairs), registry);
    (manager, driver)
}

#[test]
fn test_unknown_pool_fails_immediately() {
    let (manager, driver) = manager_with([("driver", "mock"), ("main.url", "mock:main")]);

    let start = Instant::now();
    let err = manager
        .get_connection_timeout("missing", Duration::from_secs(5))
        .unwrap_err();

    assert!(matches!(err, MdaoError::UnknownPool(ref name) if name == "missing"));
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(manager.get_connection("missing").is_err());
    assert_eq!(driver.opened.load(Ordering::SeqCst), 0);
}

#[test]
fn test_routes_to_named_pool() {
    let (manager, driver) = manager_with([
        ("driver", "mock"),
        ("main.url", "mock:main"),
        ("main.user", "app"),
        ("main.password", "secret"),
        ("reports.url", "mock:reports"),
    ]);

    assert_eq!(manager.pool_names(), vec!["main", "reports"]);

    let main = manager.get_connection("main").expect("main connection");
    let reports = manager.get_connection("reports").expect("reports connection");
    assert_eq!(main.pool_name(), "main");
    assert_eq!(reports.pool_name(), "reports");
    assert_eq!(main.execute("UPDATE t SET v = 1", &[]).expect("execute").affected_rows, 1);

    assert_eq!(
        *driver.credentials.lock(),
        vec![Some(Credentials::new("app", "secret")), None]
    );

    manager.free_connection("main", main).expect("free main");
    manager.free_connection("reports", reports).expect("free reports");
    assert_eq!(manager.stats("main").map(|s| s.idle()), Some(1));
    assert_eq!(manager.stats("reports").map(|s| s.idle()), Some(1));
}

#[test]
fn test_default_and_unbounded_limits() {
    let (manager, _driver) = manager_with([
        ("driver", "mock"),
        ("plain.url", "mock:plain"),
        ("quirky.url", "mock:quirky"),
        ("quirky.maxconn", "abc"),
    ]);

    let plain = manager.pool("plain").expect("plain pool");
    assert_eq!(plain.config().max_size(), 10);

    let quirky = manager.pool("quirky").expect("quirky pool");
    assert!(!quirky.config().is_bounded());

    // More than the default limit, without blocking
    let held: Vec<_> = (0..15)
        .map(|_| {
            manager
                .get_connection_timeout("quirky", Duration::ZERO)
                .expect("unbounded pool")
        })
        .collect();
    assert_eq!(manager.stats("quirky").map(|s| s.active()), Some(15));
    drop(held);
}

#[test]
fn test_bounded_pool_times_out() {
    let (manager, _driver) = manager_with([
        ("driver", "mock"),
        ("main.url", "mock:main"),
        ("main.maxconn", "1"),
    ]);

    let _held = manager.get_connection("main").expect("first");
    let timeout = Duration::from_millis(100);
    let start = Instant::now();
    let err = manager.get_connection_timeout("main", timeout).unwrap_err();

    assert!(matches!(err, MdaoError::Timeout(_)));
    assert!(start.elapsed() >= timeout);
}

#[test]
fn test_pool_without_url_is_not_created() {
    let (manager, _driver) = manager_with([
        ("driver", "mock"),
        ("ghost.user", "nobody"),
        ("blank.url", ""),
    ]);
    assert!(manager.pool_names().is_empty());
    assert!(manager.pool("ghost").is_none());
}

#[test]
fn test_partial_driver_load() {
    let (manager, _driver) = manager_with([
        ("driver", "com.example.Missing mock"),
        ("main.url", "mock:main"),
    ]);

    assert_eq!(manager.drivers().registered(), vec!["mock"]);
    manager.get_connection("main").expect("mock still registered");
}

#[test]
fn test_unregistered_driver_yields_no_connection() {
    let (manager, driver) = manager_with([("main.url", "mock:main")]);

    let err = manager
        .get_connection_timeout("main", Duration::from_millis(20))
        .unwrap_err();
    assert!(err.to_string().contains("No suitable driver"));
    assert_eq!(driver.opened.load(Ordering::SeqCst), 0);
}

#[test]
fn test_free_connection_to_unknown_pool() {
    let (manager, _driver) = manager_with([("driver", "mock"), ("main.url", "mock:main")]);

    let conn = manager.get_connection("main").expect("get");
    let err = manager.free_connection("nope", conn).unwrap_err();

    assert!(matches!(err, MdaoError::UnknownPool(_)));
    // The handle still went back to the pool it came from
    let stats = manager.stats("main").expect("stats");
    assert_eq!(stats.active(), 0);
    assert_eq!(stats.idle(), 1);
}

#[test]
fn test_release_shuts_down_pools_and_drivers() {
    let (manager, _driver) = manager_with([
        ("driver", "mock"),
        ("main.url", "mock:main"),
        ("reports.url", "mock:reports"),
    ]);

    let idle = manager.get_connection("main").expect("get");
    let outstanding = manager.get_connection("reports").expect("get");
    assert_eq!(outstanding.driver_name(), "mock");
    manager.free_connection("main", idle).expect("free");

    manager.release();

    assert!(manager.drivers().registered().is_empty());
    for name in ["main", "reports"] {
        let pool = manager.pool(name).expect("pool");
        assert!(pool.is_closed());
        assert_eq!(pool.stats().idle(), 0);
    }
    assert!(matches!(
        manager.get_connection("main"),
        Err(MdaoError::PoolClosed(_))
    ));

    // Released after shutdown: closed, not pooled
    manager
        .free_connection("reports", outstanding)
        .expect("free after release");
    assert_eq!(manager.stats("reports").map(|s| s.total()), Some(0));
}

#[test]
fn test_unreadable_configuration_yields_empty_manager() {
    let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "database.toml");
    let manager = ConnectionManager::from_load(Err(MdaoError::Io(missing)));

    assert!(manager.pool_names().is_empty());
    let start = Instant::now();
    let err = manager
        .get_connection_timeout("main", Duration::ZERO)
        .unwrap_err();
    assert!(matches!(err, MdaoError::UnknownPool(ref name) if name == "main"));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_loaded_configuration_builds_pools() {
    let properties = DatabaseProperties::from_pairs([
        ("driver", "sqlite"),
        ("main.url", "sqlite::memory:"),
    ]);
    let manager = ConnectionManager::from_load(Ok(properties));

    assert_eq!(manager.pool_names(), vec!["main"]);
    assert_eq!(manager.drivers().registered(), vec!["sqlite"]);
}

#[test]
fn test_empty_manager() {
    let manager = ConnectionManager::default();
    assert!(manager.pool_names().is_empty());
    assert!(manager.drivers().registered().is_empty());
    assert!(manager.stats("main").is_none());
    manager.release();
}
