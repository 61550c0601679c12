//! The process-wide manager. Kept in its own test binary because the global
//! instance can only be set once per process.

mod common;

use std::time::Duration;

use mdao_connection::{ConnectionManager, DatabaseProperties, MdaoError};

#[test]
fn test_install_and_global() -> anyhow::Result<()> {
    common::initialize_logging();
    let dir = tempfile::tempdir()?;
    let path = common::write_config(dir.path(), &[("main", 3)])?;
    let properties = DatabaseProperties::load(&path)?;

    let installed = ConnectionManager::new(&properties)
        .install()
        .map_err(|_| anyhow::anyhow!("global manager already initialized"))?;
    let global = ConnectionManager::global();
    assert!(std::ptr::eq(installed, global));
    assert_eq!(global.pool_names(), vec!["main"]);

    let conn = global.get_connection_timeout("main", Duration::from_secs(1))?;
    global.free_connection("main", conn)?;

    // A second install is refused and hands the manager back
    let rejected = ConnectionManager::empty().install();
    assert!(rejected.is_err());

    assert!(matches!(
        global.get_connection("nope"),
        Err(MdaoError::UnknownPool(_))
    ));

    global.release();
    assert!(global.drivers().registered().is_empty());
    Ok(())
}
