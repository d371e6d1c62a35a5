//! Terminal front-ends: a single `ask` and an interactive `chat` session.

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

use crate::config::{AppConfig, TargetArgs};
use crate::db::{BackendKind, ConnectionConfig};
use crate::llm::models::{ChatMessage, ChatRole, QueryResult};
use crate::pipeline::{Pipeline, PipelineError};
use crate::util::sql::format_sql;
use crate::util::table::DisplayTable;

pub fn connection_from_args(config: &AppConfig, target: &TargetArgs) -> ConnectionConfig {
    ConnectionConfig {
        host: target.host.clone(),
        port: target
            .port
            .unwrap_or_else(|| config.database.backend.default_port()),
        user: target.user.clone(),
        password: config.database.password.clone().unwrap_or_default(),
        database: target.database.clone(),
        encrypt: target.encrypt,
    }
}

/// Assistant text shown above the result table.
pub fn summarize(result: &QueryResult) -> String {
    match (&result.error, &result.data) {
        (Some(err), _) => format!("The generated query failed: {}", err),
        (None, Some(rows)) if rows.len() == 1 => "Found 1 row.".to_string(),
        (None, Some(rows)) => format!("Found {} rows.", rows.len()),
        (None, None) => "The query returned no data.".to_string(),
    }
}

pub fn render_result(result: &QueryResult, kind: BackendKind) -> String {
    let mut out = format!(
        "SQL:\n{}\n\n{}\n",
        format_sql(&result.sql, kind),
        summarize(result)
    );
    if result.error.is_none() {
        let table = result
            .table
            .clone()
            .or_else(|| result.data.as_deref().map(DisplayTable::from_rows))
            .unwrap_or_default();
        out.push_str(&table.render());
    }
    out.push_str(&format!("({} ms)\n", result.execution_time));
    out
}

/// In-memory conversation; nothing is persisted.
#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub async fn turn(
        &mut self,
        pipeline: &Pipeline,
        connection: &ConnectionConfig,
        question: &str,
    ) -> Result<QueryResult, PipelineError> {
        self.messages.push(ChatMessage::user(question));
        let result = pipeline.ask(connection, question).await?;
        self.messages
            .push(ChatMessage::assistant(summarize(&result), &result));
        Ok(result)
    }

    pub fn history(&self) -> String {
        self.messages
            .iter()
            .map(|m| {
                let who = match m.role {
                    ChatRole::User => "you",
                    ChatRole::Assistant => "assistant",
                };
                let time = m.timestamp.format("%H:%M:%S");
                let mut line = format!("[{}] {}: {}", time, who, m.content);
                if let Some(sql) = &m.sql {
                    line.push_str(&format!("\n    {}", sql));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub async fn ask(
    pipeline: &Pipeline,
    connection: &ConnectionConfig,
    question: &str,
) -> Result<(), PipelineError> {
    let result = pipeline.ask(connection, question).await?;
    print!("{}", render_result(&result, pipeline.backend().kind()));
    Ok(())
}

pub async fn chat(pipeline: &Pipeline, connection: &ConnectionConfig) -> anyhow::Result<()> {
    let mut session = ChatSession::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Connected to {}. Ask a question, or /schema, /history, /quit.", connection.database);
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/history" => println!("{}", session.history()),
            "/schema" => match pipeline.fetch_schema(connection).await {
                Ok(schema) => print!("{}", schema.format_for_prompt()),
                Err(e) => eprintln!("{}", e),
            },
            question => match session.turn(pipeline, connection, question).await {
                Ok(result) => print!("{}", render_result(&result, pipeline.backend().kind())),
                Err(e) => {
                    // Infrastructure failures end the turn, not the session
                    error!("Chat turn failed: {:?}", e);
                    eprintln!("{}", e);
                }
            },
        }
    }

    Ok(())
}
