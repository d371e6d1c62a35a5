use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// API Routes - JSON API consumed by the chat client
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest(
            "/api",
            Router::new()
                // Connection lifecycle
                .route(
                    "/database/connect",
                    post(handlers::database::connect).get(handlers::database::status),
                )
                .route("/database/disconnect", post(handlers::database::disconnect))

                // Schema
                .route("/database/schema", get(handlers::database::schema))

                // Natural-language query
                .route("/chat", post(handlers::api::chat)),
        )
        .route("/health", get(handlers::api::health))
}
