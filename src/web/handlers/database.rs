use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::{ConnectionConfig, DbError, SchemaInfo};
use crate::web::error::{ApiError, ApiResponse};
use crate::web::session;
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConnectRequest {
    #[serde(alias = "server")]
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    pub encrypt: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub is_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionState {
    fn disconnected(error: Option<&str>) -> Self {
        Self {
            is_connected: false,
            connection: None,
            schema: None,
            error: error.map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DisconnectMessage {
    pub message: String,
}

// POST /api/database/connect
pub async fn connect(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<ConnectRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<ApiResponse<SchemaInfo>>), ApiError> {
    let Json(payload) = payload?;
    let kind = state.pipeline.backend().kind();
    let config = ConnectionConfig {
        host: payload.host.trim().to_string(),
        port: payload.port.unwrap_or_else(|| kind.default_port()),
        user: payload.user.trim().to_string(),
        password: payload.password.unwrap_or_default(),
        database: payload.database.trim().to_string(),
        encrypt: payload.encrypt,
    };

    config
        .validate(kind)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let schema = state.pipeline.fetch_schema(&config).await.map_err(|e| {
        error!("Database connection error: {}", e);
        match e {
            DbError::Config(msg) => ApiError::BadRequest(msg),
            _ => ApiError::Internal("Failed to connect to database".to_string()),
        }
    })?;

    info!(
        "Connected to {} database {} ({} tables)",
        kind,
        config.database,
        schema.tables.len()
    );
    Ok((session::store(jar, &config), ApiResponse::ok(schema)))
}

// GET /api/database/connect
pub async fn status(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Json<ApiResponse<ConnectionState>> {
    if !session::is_connected(&jar) {
        return ApiResponse::ok(ConnectionState::disconnected(None));
    }

    let Some(config) = state.session_connection(&jar) else {
        return ApiResponse::ok(ConnectionState::disconnected(Some(
            "Connection information not found",
        )));
    };

    match state.pipeline.fetch_schema(&config).await {
        Ok(schema) => ApiResponse::ok(ConnectionState {
            is_connected: true,
            connection: Some(config.masked()),
            schema: Some(schema),
            error: None,
        }),
        Err(e) => {
            warn!("Stored connection no longer works: {}", e);
            ApiResponse::ok(ConnectionState::disconnected(Some(
                "Database connection failed, please reconnect",
            )))
        }
    }
}

// POST /api/database/disconnect
pub async fn disconnect(jar: CookieJar) -> (CookieJar, Json<ApiResponse<DisconnectMessage>>) {
    info!("Clearing database session");
    (
        session::clear(jar),
        ApiResponse::ok(DisconnectMessage {
            message: "Successfully disconnected from database".to_string(),
        }),
    )
}

// GET /api/database/schema
pub async fn schema(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<ApiResponse<BTreeMap<String, Vec<String>>>>, ApiError> {
    let config = state.session_connection(&jar).ok_or_else(|| {
        ApiError::BadRequest("Not connected to any database. Please connect first.".to_string())
    })?;

    let schema = state.pipeline.fetch_schema(&config).await.map_err(|e| {
        error!("Schema fetch error: {}", e);
        ApiError::Internal("Failed to fetch schema".to_string())
    })?;

    Ok(ApiResponse::ok(schema.column_names_by_table()))
}
