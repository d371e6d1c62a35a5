use crate::config::LlmConfig;
use crate::db::BackendKind;
use crate::llm::prompt::{system_prompt, user_prompt};
use crate::llm::{CompletionProvider, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

/// OpenAI-compatible chat completions endpoint (Groq by default).
pub struct RemoteLlmProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    dialect: BackendKind,
}

#[derive(Serialize, Debug)]
struct PromptRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: usize,
    response_format: ResponseFormat,
}

#[derive(Serialize, Debug)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize, Debug)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct PromptResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl RemoteLlmProvider {
    pub fn new(config: &LlmConfig, dialect: BackendKind) -> Result<Self, LlmError> {
        let api_url = config.api_url.clone().ok_or_else(|| {
            LlmError::ConfigError("API URL is required for remote LLM provider".to_string())
        })?;

        let api_key = config.api_key.clone().ok_or_else(|| {
            LlmError::ConfigError("API key is required for remote LLM provider".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            dialect,
        })
    }

    fn build_request(&self, question: &str, schema: &str) -> PromptRequest {
        PromptRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system_prompt(self.dialect),
                },
                Message {
                    role: "user".to_string(),
                    content: user_prompt(question, schema),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        }
    }
}

fn first_choice_content(response: PromptResponse) -> Result<String, LlmError> {
    response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::ResponseError("No choices in response".to_string()))
        .map(|choice| choice.message.content.unwrap_or_default())
}

#[async_trait]
impl CompletionProvider for RemoteLlmProvider {
    async fn complete(&self, question: &str, schema: &str) -> Result<String, LlmError> {
        let request = self.build_request(question, schema);

        info!("Sending completion request with model: {}", self.model);
        debug!("API URL: {}", self.api_url);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Completion API responded with status code: {} - {}", status, body);
            return Err(LlmError::ResponseError(format!(
                "API responded with status code: {}",
                status
            )));
        }

        let prompt_response: PromptResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        first_choice_content(prompt_response)
    }
}
