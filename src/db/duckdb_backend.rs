use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeDelta};
use duckdb::types::{TimeUnit, Value};
use duckdb::{AccessMode, Config, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::{
    BackendKind, ColumnInfo, ConnectionConfig, DatabaseBackend, DbConnection, DbError, QueryParam,
    Row, SchemaInfo, TableInfo,
};

const TABLES_QUERY: &str = "
    SELECT table_name, table_schema
    FROM information_schema.tables
    WHERE table_catalog = current_database()
      AND table_type = 'BASE TABLE'
      AND table_schema NOT IN ('information_schema', 'pg_catalog')
    ORDER BY table_schema, table_name";

const COLUMNS_QUERY: &str = "
    SELECT table_schema, table_name, column_name, data_type
    FROM information_schema.columns
    WHERE table_catalog = current_database()
      AND table_schema NOT IN ('information_schema', 'pg_catalog')
    ORDER BY table_schema, table_name, ordinal_position";

/// Local DuckDB files. `database` holds the path of an existing file, or
/// `:memory:`. Files are never created, and with `read_only` set they are
/// opened in DuckDB's read-only access mode.
pub struct DuckDbBackend {
    read_only: bool,
}

impl DuckDbBackend {
    pub fn new(read_only: bool) -> Self {
        Self { read_only }
    }
}

fn open(path: &str, read_only: bool) -> Result<Connection, DbError> {
    let connect = |e: duckdb::Error| DbError::Connect(e.to_string());

    if path == ":memory:" {
        return Connection::open_in_memory().map_err(connect);
    }

    // DuckDB would otherwise create an empty database at any writable path
    if !Path::new(path).is_file() {
        return Err(DbError::Connect(format!("database file not found: {}", path)));
    }

    if read_only {
        let config = Config::default()
            .access_mode(AccessMode::ReadOnly)
            .map_err(connect)?;
        Connection::open_with_flags(path, config).map_err(connect)
    } else {
        Connection::open(path).map_err(connect)
    }
}

#[async_trait]
impl DatabaseBackend for DuckDbBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::DuckDb
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DbConnection>, DbError> {
        config.validate(BackendKind::DuckDb)?;
        let path = config.database.clone();
        let read_only = self.read_only;

        // DuckDB calls block, keep them off the async workers
        let conn = tokio::task::spawn_blocking(move || open(&path, read_only))
            .await
            .map_err(|e| DbError::Task(e.to_string()))??;

        info!(
            "Opened DuckDB database: {} (read-only: {})",
            config.database, read_only
        );
        Ok(Box::new(DuckDbConnection {
            conn: Arc::new(Mutex::new(conn)),
        }))
    }
}

pub struct DuckDbConnection {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbConnection {
    async fn with_conn<T, F>(&self, f: F) -> Result<T, DbError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, DbError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| DbError::Task("DuckDB connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| DbError::Task(e.to_string()))?
    }
}

#[async_trait]
impl DbConnection for DuckDbConnection {
    async fn introspect(&mut self) -> Result<SchemaInfo, DbError> {
        self.with_conn(|conn| {
            let introspection = |e: duckdb::Error| DbError::Introspection(e.to_string());

            let mut tables_stmt = conn.prepare(TABLES_QUERY).map_err(introspection)?;
            let tables = tables_stmt
                .query_map([], |row| {
                    Ok(TableInfo {
                        table_name: row.get(0)?,
                        table_schema: row.get(1)?,
                    })
                })
                .map_err(introspection)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(introspection)?;

            let mut columns_stmt = conn.prepare(COLUMNS_QUERY).map_err(introspection)?;
            let columns = columns_stmt
                .query_map([], |row| {
                    Ok(ColumnInfo {
                        table_schema: row.get(0)?,
                        table_name: row.get(1)?,
                        column_name: row.get(2)?,
                        data_type: row.get(3)?,
                    })
                })
                .map_err(introspection)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(introspection)?;

            debug!(
                "Introspected {} tables and {} columns",
                tables.len(),
                columns.len()
            );
            Ok(SchemaInfo { tables, columns })
        })
        .await
    }

    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> Result<Vec<Row>, DbError> {
        let sql = sql.to_string();
        let params: Vec<Value> = params.iter().map(param_to_value).collect();

        self.with_conn(move |conn| {
            let query_error = |e: duckdb::Error| DbError::Query(e.to_string());

            let mut stmt = conn.prepare(&sql).map_err(query_error)?;
            let mut rows = stmt
                .query(duckdb::params_from_iter(params.iter()))
                .map_err(query_error)?;

            let columns = rows
                .as_ref()
                .map(|s| s.column_names())
                .unwrap_or_default();

            let mut records = Vec::new();
            while let Some(row) = rows.next().map_err(query_error)? {
                let mut record = Row::new();
                for (i, name) in columns.iter().enumerate() {
                    let value: Value = row.get(i).map_err(query_error)?;
                    record.insert(name.clone(), value_to_json(value));
                }
                records.push(record);
            }

            Ok(records)
        })
        .await
    }

    async fn close(self: Box<Self>) {
        // Connection closes when the last Arc is dropped
        debug!("Closing DuckDB connection");
    }
}

fn param_to_value(param: &QueryParam) -> Value {
    match param {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Value::BigInt(i),
            (None, Some(f)) => Value::Double(f),
            _ => Value::Text(n.to_string()),
        },
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

fn micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// Converts a DuckDB value to JSON. Temporal values become ISO-8601 strings,
/// decimals and wide integers become strings to keep their precision.
fn value_to_json(value: Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(b),
        Value::TinyInt(v) => Json::from(v),
        Value::SmallInt(v) => Json::from(v),
        Value::Int(v) => Json::from(v),
        Value::BigInt(v) => Json::from(v),
        Value::UTinyInt(v) => Json::from(v),
        Value::USmallInt(v) => Json::from(v),
        Value::UInt(v) => Json::from(v),
        Value::UBigInt(v) => Json::from(v),
        Value::HugeInt(v) => Json::String(v.to_string()),
        Value::Float(v) => serde_json::Number::from_f64(f64::from(v))
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Double(v) => serde_json::Number::from_f64(v)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Decimal(d) => Json::String(d.to_string()),
        Value::Text(s) | Value::Enum(s) => Json::String(s),
        Value::Blob(bytes) => Json::String(String::from_utf8_lossy(&bytes).into_owned()),
        Value::Timestamp(unit, v) => DateTime::from_timestamp_micros(micros(unit, v))
            .map(|ts| Json::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)))
            .unwrap_or(Json::Null),
        Value::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(TimeDelta::days(i64::from(days))))
            .map(|d| Json::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Json::Null),
        Value::Time64(unit, v) => {
            let total = micros(unit, v);
            let secs = total / 1_000_000;
            Json::String(format!(
                "{:02}:{:02}:{:02}.{:06}",
                secs / 3600,
                (secs / 60) % 60,
                secs % 60,
                total % 1_000_000
            ))
        }
        Value::List(items) | Value::Array(items) => {
            Json::Array(items.into_iter().map(value_to_json).collect())
        }
        other => Json::String(format!("{:?}", other)),
    }
}
