//! SQLite connection implementation

use mdao_core::{
    ColumnMeta, Connection, MdaoError, QueryResult, Result, Row, StatementResult, Value,
};
use parking_lot::Mutex;
use rusqlite::{Connection as RusqliteConnection, OpenFlags, params_from_iter};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite connection wrapper
///
/// The underlying handle is dropped on `close`, after which every call fails
/// and `is_closed` reports `true`.
#[derive(Debug)]
pub struct SqliteConnection {
    conn: Mutex<Option<RusqliteConnection>>,
    path: String,
}

impl SqliteConnection {
    /// Open a SQLite database. `:memory:` opens a private in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path = %path, "opening SQLite database");

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                MdaoError::Connection(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            if !path.starts_with("file:") {
                let file_path = std::path::Path::new(path);
                if let Some(parent) = file_path.parent()
                    && !parent.as_os_str().is_empty()
                    && !parent.exists()
                {
                    return Err(MdaoError::Connection(format!(
                        "Parent directory does not exist: {}",
                        parent.display()
                    )));
                }
            }

            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;

            RusqliteConnection::open_with_flags(path, flags).map_err(|e| {
                MdaoError::Connection(format!(
                    "Failed to open SQLite database at '{}': {}",
                    path, e
                ))
            })?
        };

        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| MdaoError::Connection(format!("Failed to enable foreign keys: {}", e)))?;

        // Pooled connections share one file; wait for locks instead of failing fast.
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| MdaoError::Connection(format!("Failed to set busy timeout: {}", e)))?;

        tracing::debug!(path = %path, "SQLite database connection established");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: path.to_string(),
        })
    }

    /// Path (or `:memory:`) this connection was opened with
    pub fn path(&self) -> &str {
        &self.path
    }

    fn with_conn<T>(&self, f: impl FnOnce(&RusqliteConnection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| MdaoError::Connection("SQLite connection is closed".into()))?;
        f(conn)
    }
}

impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.with_conn(|conn| {
            let rusqlite_params = values_to_rusqlite(params);
            let rows_affected = conn
                .execute(sql, params_from_iter(rusqlite_params.iter()))
                .map_err(|e| MdaoError::Query(format!("Failed to execute statement: {}", e)))?;

            tracing::debug!(affected_rows = rows_affected, "statement executed");
            Ok(StatementResult {
                affected_rows: rows_affected as u64,
            })
        })
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let start_time = std::time::Instant::now();

        self.with_conn(|conn| {
            let rusqlite_params = values_to_rusqlite(params);
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| MdaoError::Query(format!("Failed to prepare query: {}", e)))?;

            let mut column_names = Vec::with_capacity(stmt.column_count());
            let mut columns = Vec::with_capacity(stmt.column_count());
            for (idx, col) in stmt.columns().iter().enumerate() {
                let name = col.name().to_string();
                column_names.push(name.clone());
                columns.push(ColumnMeta {
                    name,
                    data_type: col.decl_type().unwrap_or("DYNAMIC").to_string(),
                    ordinal: idx,
                });
            }

            let mut rows = Vec::new();
            let mut query_rows = stmt
                .query(params_from_iter(rusqlite_params.iter()))
                .map_err(|e| MdaoError::Query(format!("Failed to execute query: {}", e)))?;

            while let Some(row) = query_rows
                .next()
                .map_err(|e| MdaoError::Query(format!("Failed to fetch row: {}", e)))?
            {
                let mut values = Vec::with_capacity(columns.len());
                for i in 0..columns.len() {
                    values.push(rusqlite_to_value(row, i)?);
                }
                rows.push(Row::new(column_names.clone(), values));
            }

            let execution_time_ms = start_time.elapsed().as_millis() as u64;
            tracing::debug!(
                row_count = rows.len(),
                execution_time_ms = execution_time_ms,
                "query executed successfully"
            );
            Ok(QueryResult {
                columns,
                rows,
                execution_time_ms,
            })
        })
    }

    fn close(&self) -> Result<()> {
        let mut guard = self.conn.lock();
        let Some(conn) = guard.take() else {
            return Ok(());
        };

        match conn.close() {
            Ok(()) => {
                tracing::debug!(path = %self.path, "SQLite connection closed");
                Ok(())
            }
            Err((conn, e)) => {
                *guard = Some(conn);
                Err(MdaoError::Connection(format!(
                    "Failed to close SQLite connection: {}",
                    e
                )))
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }
}

fn values_to_rusqlite(values: &[Value]) -> Vec<rusqlite::types::Value> {
    values.iter().map(value_to_rusqlite).collect()
}

fn value_to_rusqlite(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(if *b { 1 } else { 0 }),
        Value::Int64(i) => rusqlite::types::Value::Integer(*i),
        Value::Float64(f) => rusqlite::types::Value::Real(*f),
        Value::String(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Bytes(b) => rusqlite::types::Value::Blob(b.clone()),
    }
}

/// Convert rusqlite row value to our Value type
fn rusqlite_to_value(row: &rusqlite::Row, idx: usize) -> Result<Value> {
    use rusqlite::types::ValueRef;

    let value_ref = row
        .get_ref(idx)
        .map_err(|e| MdaoError::Query(e.to_string()))?;

    let value = match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    };

    Ok(value)
}
