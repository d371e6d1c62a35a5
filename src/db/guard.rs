use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::parser::Parser;
use thiserror::Error;
use tracing::debug;

use super::BackendKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("Generated SQL could not be parsed: {0}")]
    Unparsable(String),
    #[error("Generated SQL is empty")]
    Empty,
    #[error("Only a single statement may be executed, got {0}")]
    MultipleStatements(usize),
    #[error("Only read-only queries are allowed, got: {0}")]
    NotReadOnly(String),
}

/// Read-only allow-list applied to generated SQL before it reaches the driver.
///
/// A statement passes only when it is a query whose every body, including
/// CTEs, nested queries and both sides of set operations, is a plain
/// `SELECT`, `VALUES` or `TABLE`. `SELECT ... INTO` and locking reads are
/// refused as well.
#[derive(Debug, Clone, Copy)]
pub struct QueryGuard {
    kind: BackendKind,
    enabled: bool,
}

impl QueryGuard {
    pub fn new(kind: BackendKind, enabled: bool) -> Self {
        Self { kind, enabled }
    }

    pub fn check(&self, sql: &str) -> Result<(), GuardError> {
        if !self.enabled {
            return Ok(());
        }

        let statements = Parser::parse_sql(self.kind.dialect().as_ref(), sql)
            .map_err(|e| GuardError::Unparsable(e.to_string()))?;

        match statements.as_slice() {
            [] => Err(GuardError::Empty),
            [Statement::Query(query)] => {
                check_query(query)?;
                debug!("Query guard accepted statement");
                Ok(())
            }
            [other] => Err(GuardError::NotReadOnly(leading_keyword(other))),
            many => Err(GuardError::MultipleStatements(many.len())),
        }
    }
}

fn check_query(query: &Query) -> Result<(), GuardError> {
    if !query.locks.is_empty() {
        return Err(GuardError::NotReadOnly("SELECT ... FOR UPDATE".to_string()));
    }

    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            check_query(&cte.query)?;
        }
    }

    check_body(&query.body)
}

fn check_body(body: &SetExpr) -> Result<(), GuardError> {
    match body {
        SetExpr::Select(select) if select.into.is_some() => {
            Err(GuardError::NotReadOnly("SELECT ... INTO".to_string()))
        }
        SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Table(_) => Ok(()),
        SetExpr::Query(query) => check_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            check_body(left)?;
            check_body(right)
        }
        SetExpr::Insert(statement) | SetExpr::Update(statement) | SetExpr::Delete(statement) => {
            Err(GuardError::NotReadOnly(leading_keyword(statement)))
        }
    }
}

// Leading keyword of the rendered statement, e.g. "DELETE".
fn leading_keyword(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase()
}
