//! OpenAI-compatible chat completions provider
//!
//! Sends the system and user prompts to `{base_url}/chat/completions` with
//! `response_format = json_object` and parses the first choice's content
//! against the response contract.
//!
//! Works with any server speaking the same API (set `OPENAI_BASE_URL`).

#![cfg_attr(not(feature = "openai"), allow(dead_code))]

use crate::generator::{Generation, GenerationError, SqlGenerator};
use crate::prompt::PromptBundle;
use nl2sql_core::LlmConfig;

#[cfg(feature = "openai")]
use crate::generator::parse_generation;

#[cfg(feature = "openai")]
use std::time::Duration;

#[cfg(not(feature = "openai"))]
const NOT_COMPILED: &str =
    "OpenAI support not compiled. Rebuild with: cargo build --features openai";

pub struct OpenAiGenerator {
    #[cfg(feature = "openai")]
    client: reqwest::Client,

    model: String,

    base_url: String,

    api_key: String,

    timeout_secs: u64,
}

impl OpenAiGenerator {
    /// Create a client from settings; the API key must be present
    pub fn new(config: &LlmConfig) -> Result<Self, GenerationError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GenerationError::Config("OPENAI_API_KEY is not set".to_string()))?;

        #[cfg(feature = "openai")]
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            #[cfg(feature = "openai")]
            client,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(&self, prompt: &PromptBundle) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "temperature": 1,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": prompt.system_prompt },
                { "role": "user", "content": prompt.user_prompt },
            ],
        })
    }
}

/// Message content of the first choice
fn first_choice_content(data: &serde_json::Value) -> Result<&str, GenerationError> {
    let choice = data
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or(GenerationError::MissingChoices)?;

    match choice["message"]["content"].as_str() {
        Some(content) if !content.trim().is_empty() => Ok(content),
        _ => Err(GenerationError::EmptyContent),
    }
}

#[async_trait::async_trait]
impl SqlGenerator for OpenAiGenerator {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    #[cfg(feature = "openai")]
    async fn generate(&self, prompt: &PromptBundle) -> Result<Generation, GenerationError> {
        tracing::debug!(model = %self.model, endpoint = %self.endpoint(), "requesting generation");

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(self.timeout_secs)
                } else {
                    GenerationError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(GenerationError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Http(format!("{}: {}", status, body)));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidJson(e.to_string()))?;

        let generation = parse_generation(first_choice_content(&data)?)?;
        tracing::debug!(confidence = generation.confidence, "received generation");
        Ok(generation)
    }

    #[cfg(not(feature = "openai"))]
    async fn generate(&self, _prompt: &PromptBundle) -> Result<Generation, GenerationError> {
        Err(GenerationError::Config(NOT_COMPILED.to_string()))
    }
}
