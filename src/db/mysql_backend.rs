use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow, MySqlSslMode};
use sqlx::query::Query;
use sqlx::{Column, ConnectOptions, Connection, MySql, Row as _, TypeInfo};
use tracing::{debug, info, warn};

use super::{
    BackendKind, ColumnInfo, ConnectionConfig, DatabaseBackend, DbConnection, DbError, QueryParam,
    Row, SchemaInfo, TableInfo,
};

const TABLES_QUERY: &str = "
    SELECT CAST(TABLE_NAME AS CHAR), CAST(TABLE_SCHEMA AS CHAR)
    FROM information_schema.TABLES
    WHERE TABLE_SCHEMA = ?
    ORDER BY TABLE_NAME";

const COLUMNS_QUERY: &str = "
    SELECT CAST(TABLE_SCHEMA AS CHAR), CAST(TABLE_NAME AS CHAR),
           CAST(COLUMN_NAME AS CHAR), CAST(DATA_TYPE AS CHAR)
    FROM information_schema.COLUMNS
    WHERE TABLE_SCHEMA = ?
    ORDER BY TABLE_NAME, ORDINAL_POSITION";

pub struct MySqlBackend;

impl MySqlBackend {
    fn connect_options(config: &ConnectionConfig) -> MySqlConnectOptions {
        let port = if config.port == 0 {
            BackendKind::MySql.default_port()
        } else {
            config.port
        };

        MySqlConnectOptions::new()
            .host(&config.host)
            .port(port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .ssl_mode(if config.encrypt {
                MySqlSslMode::Required
            } else {
                MySqlSslMode::Preferred
            })
    }
}

#[async_trait]
impl DatabaseBackend for MySqlBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::MySql
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DbConnection>, DbError> {
        config.validate(BackendKind::MySql)?;

        let conn = Self::connect_options(config)
            .connect()
            .await
            .map_err(|e| DbError::Connect(e.to_string()))?;

        info!(
            "Connected to MySQL {}:{}/{} as {}",
            config.host, config.port, config.database, config.user
        );
        Ok(Box::new(MySqlDbConnection {
            conn,
            database: config.database.clone(),
        }))
    }
}

pub struct MySqlDbConnection {
    conn: MySqlConnection,
    database: String,
}

#[async_trait]
impl DbConnection for MySqlDbConnection {
    async fn introspect(&mut self) -> Result<SchemaInfo, DbError> {
        let introspection = |e: sqlx::Error| DbError::Introspection(e.to_string());

        let tables = sqlx::query_as::<_, (String, String)>(TABLES_QUERY)
            .bind(&self.database)
            .fetch_all(&mut self.conn)
            .await
            .map_err(introspection)?
            .into_iter()
            .map(|(table_name, table_schema)| TableInfo {
                table_name,
                table_schema,
            })
            .collect::<Vec<_>>();

        let columns = sqlx::query_as::<_, (String, String, String, String)>(COLUMNS_QUERY)
            .bind(&self.database)
            .fetch_all(&mut self.conn)
            .await
            .map_err(introspection)?
            .into_iter()
            .map(|(table_schema, table_name, column_name, data_type)| ColumnInfo {
                table_schema,
                table_name,
                column_name,
                data_type,
            })
            .collect::<Vec<_>>();

        debug!(
            "Introspected {} tables and {} columns in {}",
            tables.len(),
            columns.len(),
            self.database
        );
        Ok(SchemaInfo { tables, columns })
    }

    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> Result<Vec<Row>, DbError> {
        let query = params
            .iter()
            .fold(sqlx::query(sql), |query, param| bind_param(query, param));

        let rows = query
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn close(self: Box<Self>) {
        let this = *self;
        if let Err(e) = this.conn.close().await {
            warn!("Error closing MySQL connection: {}", e);
        }
    }
}

fn bind_param<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    param: &QueryParam,
) -> Query<'q, MySql, MySqlArguments> {
    match param {
        serde_json::Value::Null => query.bind(None::<String>),
        serde_json::Value::Bool(b) => query.bind(*b),
        serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => query.bind(i),
            (None, Some(f)) => query.bind(f),
            _ => query.bind(n.to_string()),
        },
        serde_json::Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

fn row_to_record(row: &MySqlRow) -> Row {
    let mut record = Row::new();
    for column in row.columns() {
        let value = decode_cell(row, column.ordinal(), column.type_info().name());
        record.insert(column.name().to_string(), value);
    }
    record
}

/// How a column is read, chosen from its MySQL type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Bool,
    Int,
    UInt,
    Year,
    Float,
    Double,
    Decimal,
    Date,
    DateTime,
    Timestamp,
    Time,
    Json,
    Bytes,
    Text,
}

fn cell_kind(type_name: &str) -> CellKind {
    match type_name {
        "BOOLEAN" => CellKind::Bool,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => CellKind::Int,
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => CellKind::UInt,
        "YEAR" => CellKind::Year,
        "FLOAT" => CellKind::Float,
        "DOUBLE" => CellKind::Double,
        "DECIMAL" => CellKind::Decimal,
        "DATE" => CellKind::Date,
        "DATETIME" => CellKind::DateTime,
        "TIMESTAMP" => CellKind::Timestamp,
        "TIME" => CellKind::Time,
        "JSON" => CellKind::Json,
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" => {
            CellKind::Bytes
        }
        _ => CellKind::Text,
    }
}

/// Decodes one cell by its MySQL type name. Temporal values become ISO-8601
/// strings, decimals become strings. Undecodable cells fall back to text.
fn decode_cell(row: &MySqlRow, index: usize, type_name: &str) -> serde_json::Value {
    use serde_json::Value as Json;

    let decoded: Result<Json, sqlx::Error> = match cell_kind(type_name) {
        CellKind::Bool => row
            .try_get::<Option<bool>, _>(index)
            .map(|v| v.map(Json::Bool).unwrap_or(Json::Null)),
        CellKind::Int => row
            .try_get::<Option<i64>, _>(index)
            .map(|v| v.map(Json::from).unwrap_or(Json::Null)),
        CellKind::UInt => row
            .try_get::<Option<u64>, _>(index)
            .map(|v| v.map(Json::from).unwrap_or(Json::Null)),
        // Sent as a two-byte integer; its column flags vary by server version
        CellKind::Year => row
            .try_get_unchecked::<Option<u16>, _>(index)
            .map(|v| v.map(Json::from).unwrap_or(Json::Null)),
        CellKind::Float => row
            .try_get::<Option<f32>, _>(index)
            .map(|v| float_json(v.map(f64::from))),
        CellKind::Double => row.try_get::<Option<f64>, _>(index).map(float_json),
        CellKind::Decimal => row
            .try_get::<Option<Decimal>, _>(index)
            .map(|v| v.map(|d| Json::String(d.to_string())).unwrap_or(Json::Null)),
        CellKind::Date => row
            .try_get::<Option<NaiveDate>, _>(index)
            .map(|v| text_json(v.map(|d| d.format("%Y-%m-%d").to_string()))),
        CellKind::DateTime => row.try_get::<Option<NaiveDateTime>, _>(index).map(|v| {
            text_json(v.map(|dt| dt.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true)))
        }),
        CellKind::Timestamp => row
            .try_get::<Option<DateTime<Utc>>, _>(index)
            .map(|v| text_json(v.map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true)))),
        CellKind::Time => row
            .try_get::<Option<NaiveTime>, _>(index)
            .map(|v| text_json(v.map(|t| t.to_string()))),
        CellKind::Json => row
            .try_get::<Option<serde_json::Value>, _>(index)
            .map(|v| v.unwrap_or(Json::Null)),
        CellKind::Bytes => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .map(|v| text_json(v.map(|b| String::from_utf8_lossy(&b).into_owned()))),
        CellKind::Text => row.try_get::<Option<String>, _>(index).map(text_json),
    };

    decoded.unwrap_or_else(|e| {
        debug!("Falling back to raw text for {} column: {}", type_name, e);
        row.try_get_unchecked::<Option<String>, _>(index)
            .map(text_json)
            .unwrap_or(Json::Null)
    })
}

fn text_json(value: Option<String>) -> serde_json::Value {
    value.map(serde_json::Value::String).unwrap_or(serde_json::Value::Null)
}

fn float_json(value: Option<f64>) -> serde_json::Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}
