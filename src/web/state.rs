use crate::config::AppConfig;
use crate::db::ConnectionConfig;
use crate::pipeline::Pipeline;
use axum_extra::extract::cookie::CookieJar;

use super::session;

/// Shared application state for the web server. Immutable after start-up.
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: Pipeline,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: Pipeline) -> Self {
        Self {
            config,
            pipeline,
            startup_time: chrono::Utc::now(),
        }
    }

    /// Rebuilds the connection for a cookie-backed session. The password is
    /// the server-side secret; cookies never carry it.
    pub fn session_connection(&self, jar: &CookieJar) -> Option<ConnectionConfig> {
        let params = session::read(jar, self.pipeline.backend().kind())?;
        Some(params.into_config(
            self.config.database.password.clone().unwrap_or_default(),
        ))
    }
}
