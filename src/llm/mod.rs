pub mod extract;
pub mod models;
pub mod prompt;
pub mod providers;

use crate::config::LlmConfig;
use crate::db::BackendKind;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use self::extract::{extract_sql, Extracted};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),
    #[error("LLM response error: {0}")]
    ResponseError(String),
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

/// One round trip to a completion endpoint. Returns the model's raw text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, question: &str, schema: &str) -> Result<String, LlmError>;
}

pub struct LlmManager {
    provider: Box<dyn CompletionProvider>,
}

impl LlmManager {
    pub fn new(config: &LlmConfig, dialect: BackendKind) -> Result<Self, LlmError> {
        let provider: Box<dyn CompletionProvider> = match config.backend.as_str() {
            "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config, dialect)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config, dialect)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self { provider })
    }

    pub fn with_provider(provider: Box<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Asks the model for SQL and pulls it out of the reply.
    pub async fn generate_sql(&self, question: &str, schema: &str) -> Result<Extracted, LlmError> {
        let content = self.provider.complete(question, schema).await?;
        debug!("Raw completion: {}", content);

        let extracted = extract_sql(&content);
        info!("Extracted SQL via {:?} tier: {}", extracted.tier, extracted.sql);

        // Ensure we don't return empty SQL
        if extracted.sql.is_empty() {
            return Err(LlmError::ResponseError(
                "Failed to extract valid SQL from response".to_string(),
            ));
        }

        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::extract::ExtractionTier;
    use super::*;
    use crate::config::AppConfig;

    struct Canned(&'static str);

    #[async_trait]
    impl CompletionProvider for Canned {
        async fn complete(&self, _question: &str, _schema: &str) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn generate_sql_runs_the_extractor() {
        let manager = LlmManager::with_provider(Box::new(Canned(r#"{"sql":" SELECT 1; "}"#)));
        let extracted = manager.generate_sql("one", "").await.unwrap();
        assert_eq!(extracted.sql, "SELECT 1;");
        assert_eq!(extracted.tier, ExtractionTier::Json);
    }

    #[tokio::test]
    async fn blank_completion_is_a_response_error() {
        let manager = LlmManager::with_provider(Box::new(Canned("  \n ")));
        let err = manager.generate_sql("one", "").await.unwrap_err();
        assert!(matches!(err, LlmError::ResponseError(_)));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut config = AppConfig::default().llm;
        config.backend = "local".to_string();
        let err = LlmManager::new(&config, BackendKind::MySql).err().unwrap();
        assert_eq!(
            err.to_string(),
            "LLM configuration error: Unsupported LLM backend: local"
        );
    }
}
