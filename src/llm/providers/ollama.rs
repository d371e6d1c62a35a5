use crate::config::LlmConfig;
use crate::db::BackendKind;
use crate::llm::prompt::{system_prompt, user_prompt};
use crate::llm::{CompletionProvider, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/api/generate";

pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    dialect: BackendKind,
}

#[derive(Serialize, Debug)]
struct OllamaRequest {
    model: String,
    system: String,
    prompt: String,
    format: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize, Debug)]
struct OllamaOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    done: Option<bool>,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig, dialect: BackendKind) -> Result<Self, LlmError> {
        // The shared default points at the hosted endpoint; ignore it here.
        let api_url = config
            .api_url
            .clone()
            .filter(|url| url.contains("/api/generate"))
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            dialect,
        })
    }

    fn build_request(&self, question: &str, schema: &str) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            system: system_prompt(self.dialect),
            prompt: user_prompt(question, schema),
            format: "json".to_string(),
            stream: false, // Explicitly disable streaming
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        }
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    async fn complete(&self, question: &str, schema: &str) -> Result<String, LlmError> {
        let request = self.build_request(question, schema);

        info!("Sending request to Ollama with model: {}", self.model);
        debug!("API URL: {}", self.api_url);

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            // Try to get the error message from the response body
            let error_body = match response.text().await {
                Ok(body) => format!(" - Response body: {}", body),
                Err(_) => String::new(),
            };

            error!("Ollama API responded with status code: {}{}", status, error_body);
            return Err(LlmError::ResponseError(format!(
                "Ollama API responded with status code: {}{}",
                status, error_body
            )));
        }

        // Get the raw text response first for diagnostics
        let response_text = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseError(format!("Failed to read response body: {}", e)))?;

        parse_response(&response_text)
    }
}

fn parse_response(body: &str) -> Result<String, LlmError> {
    let ollama_response = serde_json::from_str::<OllamaResponse>(body).map_err(|e| {
        error!("Failed to parse Ollama response: {} - Response was: {}", e, body);
        LlmError::ResponseError(format!("Failed to parse Ollama response: {}", e))
    })?;

    if ollama_response.done == Some(false) {
        debug!("Ollama reported an unfinished generation");
    }

    Ok(ollama_response.response)
}
