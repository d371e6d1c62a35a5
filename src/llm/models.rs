use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Row;
use crate::util::table::DisplayTable;

/// Shape the model is asked to reply with. Some prompts ask for `sql_query`,
/// so both keys are read; `sql` wins when both are present.
#[derive(Debug, Deserialize)]
pub struct GeneratedQuery {
    pub sql: Option<String>,
    pub sql_query: Option<String>,
}

impl GeneratedQuery {
    pub fn into_sql(self) -> Option<String> {
        self.sql.or(self.sql_query)
    }
}

/// Outcome of one chat turn. `error` set means the generated SQL failed,
/// which is reported inside a successful reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub sql: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Row>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<DisplayTable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Row>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: ChatRole::User,
            content: content.into(),
            timestamp: Utc::now(),
            sql: None,
            data: None,
            error: None,
        }
    }

    pub fn assistant(content: impl Into<String>, result: &QueryResult) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: ChatRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            sql: Some(result.sql.clone()),
            data: result.data.clone(),
            error: result.error.clone(),
        }
    }
}
