//! Shared helpers for the integration tests

use std::path::{Path, PathBuf};

pub fn initialize_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("mdao_connection=debug".parse().unwrap())
                    .add_directive("mdao_drivers=debug".parse().unwrap()),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Write a `database.toml` with one SQLite pool per `(name, maxconn)` pair,
/// each backed by its own file in `dir`
pub fn write_config(dir: &Path, pools: &[(&str, u32)]) -> std::io::Result<PathBuf> {
    let mut toml = String::from("driver = [\"sqlite\"]\n");
    for (name, maxconn) in pools {
        let db = dir.join(format!("{}.db", name));
        toml.push_str(&format!(
            "\n[{}]\nurl = 'sqlite:{}'\nmaxconn = {}\n",
            name,
            db.display(),
            maxconn
        ));
    }
    let path = dir.join("database.toml");
    std::fs::write(&path, toml)?;
    Ok(path)
}
