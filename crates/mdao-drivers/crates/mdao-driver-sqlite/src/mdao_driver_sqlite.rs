//! SQLite database driver implementation

mod connection;
mod driver;

pub use connection::SqliteConnection;
pub use driver::{SqliteDriver, parse_sqlite_url};
