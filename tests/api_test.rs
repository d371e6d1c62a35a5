use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

use nl_query::config::AppConfig;
use nl_query::db::{backend_for, BackendKind};
use nl_query::llm::{CompletionProvider, LlmError, LlmManager};
use nl_query::pipeline::Pipeline;
use nl_query::web::{self, state::AppState};

struct Scripted(Result<&'static str, &'static str>);

#[async_trait]
impl CompletionProvider for Scripted {
    async fn complete(&self, _question: &str, _schema: &str) -> Result<String, LlmError> {
        self.0
            .map(str::to_string)
            .map_err(|e| LlmError::ConnectionError(e.to_string()))
    }
}

fn app(reply: Result<&'static str, &'static str>) -> Router {
    let mut config = AppConfig::default();
    config.database.backend = BackendKind::DuckDb;

    let pipeline = Pipeline::new(
        backend_for(BackendKind::DuckDb, true),
        LlmManager::with_provider(Box::new(Scripted(reply))),
        true,
    );
    web::router(Arc::new(AppState::new(config, pipeline)))
}

/// A DuckDB file with one populated table, removed on drop.
struct SeededDb(PathBuf);

impl SeededDb {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("nlq-{}.duckdb", uuid::Uuid::new_v4()));
        let conn = duckdb::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE customers (id INTEGER, name VARCHAR);
             INSERT INTO customers VALUES (1, 'Ada'), (2, NULL);",
        )
        .unwrap();
        Self(path)
    }

    fn path(&self) -> String {
        self.0.to_string_lossy().into_owned()
    }

    fn cookie(&self) -> String {
        format!("db_connected=true; db_database={}", self.path())
    }
}

impl Drop for SeededDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
        let _ = std::fs::remove_file(self.0.with_extension("duckdb.wal"));
    }
}

fn post_json(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookies(response: &axum::response::Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_reports_the_backend() {
    let response = app(Ok("")).oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "duckdb");
}

#[tokio::test]
async fn chat_without_a_session_is_a_bad_request() {
    let response = app(Ok(r#"{"sql": "SELECT 1"}"#))
        .oneshot(post_json("/api/chat", json!({"message": "how many?"}), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(
        body["error"],
        "Not connected to any database. Please connect first."
    );
}

#[tokio::test]
async fn connect_returns_the_schema_and_sets_session_cookies() {
    let db = SeededDb::new();
    let response = app(Ok(""))
        .oneshot(post_json(
            "/api/database/connect",
            json!({"database": db.path(), "password": "never-stored"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("db_connected=true")));
    assert!(cookies.iter().all(|c| !c.contains("never-stored")));
    assert!(cookies.iter().all(|c| c.contains("HttpOnly")));

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["tables"][0]["table_name"], "customers");
    assert_eq!(body["data"]["columns"][1]["column_name"], "name");
}

#[tokio::test]
async fn connect_without_a_database_is_rejected() {
    let response = app(Ok(""))
        .oneshot(post_json("/api/database/connect", json!({"host": "x"}), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookies(&response).is_empty());

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn connect_to_an_unreachable_database_hides_the_cause() {
    let missing = std::env::temp_dir()
        .join(format!("nlq-missing-{}", uuid::Uuid::new_v4()))
        .join("nested.duckdb");
    let response = app(Ok(""))
        .oneshot(post_json(
            "/api/database/connect",
            json!({"database": missing.to_string_lossy()}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Failed to connect to database");
}

#[tokio::test]
async fn connect_to_a_missing_file_does_not_create_it() {
    let file_name = format!("nlq-typo-{}.duckdb", uuid::Uuid::new_v4());
    let missing = std::env::temp_dir().join(file_name);
    let response = app(Ok(""))
        .oneshot(post_json(
            "/api/database/connect",
            json!({"database": missing.to_string_lossy()}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookies(&response).is_empty());
    assert!(!missing.exists());
}

#[tokio::test]
async fn malformed_bodies_get_the_error_envelope() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/database/connect")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let response = app(Ok("")).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Invalid request body"));
}

#[tokio::test]
async fn chat_checks_the_session_before_the_body() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .body(Body::from("not json"))
        .unwrap();
    let response = app(Ok("")).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(
        body["error"],
        "Not connected to any database. Please connect first."
    );
}

#[tokio::test]
async fn chat_without_a_content_type_is_a_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::COOKIE, "db_connected=true; db_database=:memory:")
        .body(Body::from(r#"{"message": "hi"}"#))
        .unwrap();
    let response = app(Ok(r#"{"sql": "SELECT 1"}"#))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn status_without_cookies_is_disconnected() {
    let response = app(Ok(""))
        .oneshot(get("/api/database/connect", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"], json!({"isConnected": false}));
}

#[tokio::test]
async fn status_with_a_live_session_masks_the_password() {
    let db = SeededDb::new();
    let response = app(Ok(""))
        .oneshot(get("/api/database/connect", Some(&db.cookie())))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["data"]["isConnected"], true);
    assert_eq!(body["data"]["connection"]["password"], "******");
    assert_eq!(body["data"]["connection"]["database"], db.path());
}

#[tokio::test]
async fn disconnect_expires_the_session_cookies() {
    let response = app(Ok(""))
        .oneshot(post_json(
            "/api/database/disconnect",
            json!({}),
            Some("db_connected=true; db_database=:memory:"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Only cookies the client sent come back as removals
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));

    let body = body_json(response).await;
    assert_eq!(
        body["data"]["message"],
        "Successfully disconnected from database"
    );
}

#[tokio::test]
async fn schema_lists_columns_per_table() {
    let db = SeededDb::new();
    let response = app(Ok(""))
        .oneshot(get("/api/database/schema", Some(&db.cookie())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["main.customers"], json!(["id", "name"]));
}

#[tokio::test]
async fn chat_answers_with_rows_and_a_display_table() {
    let db = SeededDb::new();
    let reply = Ok(r#"{"sql": "SELECT id, name FROM customers ORDER BY id"}"#);
    let response = app(reply)
        .oneshot(post_json(
            "/api/chat",
            json!({"message": "list customers"}),
            Some(&db.cookie()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let result = &body["data"];
    assert_eq!(body["success"], true);
    assert_eq!(result["sql"], "SELECT id, name FROM customers ORDER BY id");
    assert_eq!(
        result["data"],
        json!([{"id": 1, "name": "Ada"}, {"id": 2, "name": null}])
    );
    assert_eq!(result["table"]["columns"], json!(["id", "name"]));
    assert_eq!(result["table"]["rows"][1], json!(["2", "NULL"]));
    assert!(result.get("error").is_none());
    assert!(result["executionTime"].as_u64().is_some());
}

#[tokio::test]
async fn chat_accepts_fenced_sql() {
    let reply = Ok("Here you go:\n```sql\nSELECT 42 AS answer\n```");
    let response = app(reply)
        .oneshot(post_json(
            "/api/chat",
            json!({"message": "the answer?"}),
            Some("db_connected=true; db_database=:memory:"),
        ))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["data"]["sql"], "SELECT 42 AS answer");
    assert_eq!(body["data"]["data"], json!([{"answer": 42}]));
}

#[tokio::test]
async fn failing_sql_is_reported_inside_a_successful_reply() {
    let response = app(Ok(r#"{"sql": "SELECT * FROM missing_table"}"#))
        .oneshot(post_json(
            "/api/chat",
            json!({"message": "anything"}),
            Some("db_connected=true; db_database=:memory:"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["sql"], "SELECT * FROM missing_table");
    let error = body["data"]["error"].as_str().unwrap();
    assert!(error.contains("missing_table"));
    assert!(body["data"].get("data").is_none());
    assert!(body["data"]["executionTime"].as_u64().is_some());
}

#[tokio::test]
async fn writes_are_refused_before_execution() {
    let db = SeededDb::new();
    let response = app(Ok(r#"{"sql": "DROP TABLE customers"}"#))
        .oneshot(post_json(
            "/api/chat",
            json!({"message": "drop it"}),
            Some(&db.cookie()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert!(body["data"]["error"].is_string());
    assert!(body["data"]["executionTime"].as_u64().is_some());

    let conn = duckdb::Connection::open(&db.0).unwrap();
    let count: i64 = conn
        .query_row("SELECT count(*) FROM customers", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn provider_failure_is_an_internal_error() {
    let response = app(Err("connection refused"))
        .oneshot(post_json(
            "/api/chat",
            json!({"message": "anything"}),
            Some("db_connected=true; db_database=:memory:"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Failed to generate SQL query");
}

#[tokio::test]
async fn blank_messages_are_rejected() {
    let response = app(Ok(r#"{"sql": "SELECT 1"}"#))
        .oneshot(post_json(
            "/api/chat",
            json!({"message": "   "}),
            Some("db_connected=true; db_database=:memory:"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Message must not be empty");
}
