use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::llm::models::QueryResult;
use crate::pipeline::PipelineError;
use crate::web::error::{ApiError, ApiResponse};
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub backend: String,
    pub uptime_seconds: i64,
}

// POST /api/chat
pub async fn chat(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<QueryResult>>, ApiError> {
    let config = state.session_connection(&jar).ok_or_else(|| {
        ApiError::BadRequest("Not connected to any database. Please connect first.".to_string())
    })?;
    let Json(payload) = payload?;

    let question = payload.message.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("Message must not be empty".to_string()));
    }
    debug!("Chat question: {}", question);

    let result = state.pipeline.ask(&config, question).await.map_err(|e| {
        error!("Error processing chat request: {}", e);
        match e {
            PipelineError::Generation(_) => ApiError::Internal(e.to_string()),
            PipelineError::Database(_) => {
                ApiError::Internal("Failed to process request".to_string())
            }
        }
    })?;

    if let Some(err) = &result.error {
        info!("Generated query failed, reporting to chat: {}", err);
    }

    Ok(ApiResponse::ok(result))
}

// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds();

    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.pipeline.backend().kind().to_string(),
        uptime_seconds: uptime,
    })
}
