pub mod duckdb_backend;
pub mod guard;
pub mod mysql_backend;
pub mod schema;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlparser::dialect::{Dialect, DuckDbDialect, MySqlDialect};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use schema::{ColumnInfo, SchemaInfo, TableInfo};

/// One result record: column name to value, in select-list order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Positional parameter bound to a `?` placeholder.
pub type QueryParam = serde_json::Value;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Invalid connection configuration: {0}")]
    Config(String),
    #[error("Failed to connect to database: {0}")]
    Connect(String),
    #[error("Failed to read database schema: {0}")]
    Introspection(String),
    #[error("{0}")]
    Query(String),
    #[error("Database task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "duckdb")]
    DuckDb,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::MySql => write!(f, "mysql"),
            BackendKind::DuckDb => write!(f, "duckdb"),
        }
    }
}

impl BackendKind {
    pub fn default_port(&self) -> u16 {
        match self {
            BackendKind::MySql => 3306,
            BackendKind::DuckDb => 0,
        }
    }

    /// SQL dialect used to parse and tokenize generated queries.
    pub fn dialect(&self) -> Box<dyn Dialect> {
        match self {
            BackendKind::MySql => Box::new(MySqlDialect {}),
            BackendKind::DuckDb => Box::new(DuckDbDialect {}),
        }
    }
}

/// Everything needed to reach one database. Passed explicitly through every
/// call of a request; never stored process-wide.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub encrypt: bool,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"******")
            .field("database", &self.database)
            .field("encrypt", &self.encrypt)
            .finish()
    }
}

impl ConnectionConfig {
    /// Rejects missing required fields before any network call.
    pub fn validate(&self, kind: BackendKind) -> Result<(), DbError> {
        let mut missing = Vec::new();
        if kind == BackendKind::MySql {
            if self.host.trim().is_empty() {
                missing.push("host");
            }
            if self.user.trim().is_empty() {
                missing.push("user");
            }
        }
        if self.database.trim().is_empty() {
            missing.push("database");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DbError::Config(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// Copy safe to echo back to a client.
    pub fn masked(&self) -> Self {
        Self {
            password: "******".to_string(),
            ..self.clone()
        }
    }
}

/// A live connection. Dropping it also releases the underlying handle;
/// `close` does so explicitly and logs failures.
#[async_trait]
pub trait DbConnection: Send {
    async fn introspect(&mut self) -> Result<SchemaInfo, DbError>;

    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> Result<Vec<Row>, DbError>;

    async fn close(self: Box<Self>);
}

#[async_trait]
pub trait DatabaseBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DbConnection>, DbError>;
}

/// Backend for `kind`. With `read_only` set, DuckDB files are opened in
/// read-only mode; MySQL relies on the query guard and the account's grants.
pub fn backend_for(kind: BackendKind, read_only: bool) -> Arc<dyn DatabaseBackend> {
    match kind {
        BackendKind::MySql => Arc::new(mysql_backend::MySqlBackend),
        BackendKind::DuckDb => Arc::new(duckdb_backend::DuckDbBackend::new(read_only)),
    }
}
