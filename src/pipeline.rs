//! One chat turn, end to end: schema → prompt → completion → SQL → rows.

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::db::guard::QueryGuard;
use crate::db::{ConnectionConfig, DatabaseBackend, DbConnection, DbError, SchemaInfo};
use crate::llm::models::QueryResult;
use crate::llm::{LlmError, LlmManager};
use crate::util::table::DisplayTable;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Failed to generate SQL query")]
    Generation(#[source] LlmError),
}

pub struct Pipeline {
    backend: Arc<dyn DatabaseBackend>,
    llm: LlmManager,
    guard: QueryGuard,
}

impl Pipeline {
    pub fn new(backend: Arc<dyn DatabaseBackend>, llm: LlmManager, read_only: bool) -> Self {
        let guard = QueryGuard::new(backend.kind(), read_only);
        Self {
            backend,
            llm,
            guard,
        }
    }

    pub fn backend(&self) -> &dyn DatabaseBackend {
        self.backend.as_ref()
    }

    /// Connects, reads the catalog and disconnects.
    pub async fn fetch_schema(&self, config: &ConnectionConfig) -> Result<SchemaInfo, DbError> {
        let mut conn = self.backend.connect(config).await?;
        let schema = conn.introspect().await;
        conn.close().await;
        schema
    }

    /// Answers one question. Generated-query failures come back as a
    /// `QueryResult` with `error` set; only infrastructure failures are `Err`.
    pub async fn ask(
        &self,
        config: &ConnectionConfig,
        question: &str,
    ) -> Result<QueryResult, PipelineError> {
        let mut conn = self.backend.connect(config).await?;
        let outcome = self.run_turn(conn.as_mut(), question).await;
        conn.close().await;
        outcome
    }

    async fn run_turn(
        &self,
        conn: &mut dyn DbConnection,
        question: &str,
    ) -> Result<QueryResult, PipelineError> {
        let schema = conn.introspect().await?;
        let schema_text = schema.format_for_prompt();

        let start_time = Instant::now();
        let extracted = self
            .llm
            .generate_sql(question, &schema_text)
            .await
            .map_err(|e| {
                error!("SQL generation failed: {}", e);
                PipelineError::Generation(e)
            })?;
        let sql = extracted.sql;

        if let Err(e) = self.guard.check(&sql) {
            warn!("Rejected generated SQL: {} ({})", sql, e);
            return Ok(QueryResult {
                sql,
                data: None,
                error: Some(e.to_string()),
                execution_time: elapsed_ms(start_time),
                table: None,
            });
        }

        match conn.execute(&sql, &[]).await {
            Ok(rows) => {
                let execution_time = elapsed_ms(start_time);
                info!(
                    "Query executed successfully. Row count: {}, Execution time: {}ms",
                    rows.len(),
                    execution_time
                );
                let table = DisplayTable::from_rows(&rows);
                Ok(QueryResult {
                    sql,
                    data: Some(rows),
                    error: None,
                    execution_time,
                    table: (!table.is_empty()).then_some(table),
                })
            }
            Err(e) => {
                warn!("Query execution error: {}", e);
                Ok(QueryResult {
                    sql,
                    data: None,
                    error: Some(e.to_string()),
                    execution_time: elapsed_ms(start_time),
                    table: None,
                })
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
