//! Pulls the SQL statement out of a model reply.
//!
//! Model output is not guaranteed to follow the requested format, so the
//! reply goes through an ordered chain of parsers and the first one that
//! matches wins:
//!
//! 1. a JSON object with a string `sql` (or `sql_query`) field,
//! 2. a fenced ```` ```sql ```` block anywhere in the text,
//! 3. the whole reply, trimmed.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use super::models::GeneratedQuery;

static SQL_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```sql\s*([\s\S]*?)\s*```").expect("fence pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionTier {
    Json,
    Fenced,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub sql: String,
    pub tier: ExtractionTier,
}

pub fn from_json(content: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(content.trim()).ok()?;
    if !value.is_object() {
        return None;
    }

    serde_json::from_value::<GeneratedQuery>(value)
        .ok()
        .and_then(GeneratedQuery::into_sql)
        .map(|sql| sql.trim().to_string())
}

pub fn from_fence(content: &str) -> Option<String> {
    SQL_FENCE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|sql| !sql.is_empty())
}

pub fn from_raw(content: &str) -> String {
    content.trim().to_string()
}

pub fn extract_sql(content: &str) -> Extracted {
    if let Some(sql) = from_json(content) {
        return Extracted {
            sql,
            tier: ExtractionTier::Json,
        };
    }

    if let Some(sql) = from_fence(content) {
        return Extracted {
            sql,
            tier: ExtractionTier::Fenced,
        };
    }

    Extracted {
        sql: from_raw(content),
        tier: ExtractionTier::Raw,
    }
}
