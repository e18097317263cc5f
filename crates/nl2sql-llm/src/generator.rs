//! SQL generation contract and provider selection

use crate::mock::MockGenerator;
use crate::openai::OpenAiGenerator;
use crate::prompt::PromptBundle;
use nl2sql_core::{LlmConfig, LlmProvider};
use serde::{Deserialize, Serialize};

/// Errors raised by a generator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Provider returned invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Provider response has no choices")]
    MissingChoices,

    #[error("Provider returned empty content")]
    EmptyContent,

    #[error("Response violates the contract: {0}")]
    Contract(String),
}

/// Generator output, checked against the response contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Generation {
    pub sql: String,

    pub assumptions: Vec<String>,

    /// Tables the generator claims to use, as `schema.name`
    pub tables_used: Vec<String>,

    /// Self-reported confidence in `[0, 1]`
    pub confidence: f64,
}

impl Generation {
    /// Check the constraints serde cannot express
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.sql.trim().is_empty() {
            return Err(GenerationError::Contract("sql must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(GenerationError::Contract(format!(
                "confidence {} is outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// Parse message content into a validated [`Generation`]
pub fn parse_generation(content: &str) -> Result<Generation, GenerationError> {
    if content.trim().is_empty() {
        return Err(GenerationError::EmptyContent);
    }

    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| GenerationError::InvalidJson(e.to_string()))?;
    let generation: Generation =
        serde_json::from_value(value).map_err(|e| GenerationError::Contract(e.to_string()))?;
    generation.validate()?;
    Ok(generation)
}

/// A source of SQL for a prompt
#[async_trait::async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Provider name (e.g., "OpenAI")
    fn name(&self) -> &'static str;

    async fn generate(&self, prompt: &PromptBundle) -> Result<Generation, GenerationError>;
}

/// Select the configured provider
pub fn create_generator(config: &LlmConfig) -> Result<Box<dyn SqlGenerator>, GenerationError> {
    match config.provider {
        LlmProvider::OpenAi => Ok(Box::new(OpenAiGenerator::new(config)?)),
        LlmProvider::Mock => Ok(Box::new(MockGenerator::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_contract_payload() {
        let generation = parse_generation(
            r#"{"sql":"SELECT o.id FROM public.orders AS o","assumptions":["recent means 7 days"],"tables_used":["public.orders"],"confidence":0.8}"#,
        )
        .unwrap();
        assert_eq!(generation.tables_used, vec!["public.orders"]);
        assert_eq!(generation.confidence, 0.8);
    }

    #[test]
    fn rejects_extra_fields() {
        let result = parse_generation(
            r#"{"sql":"SELECT 1","assumptions":[],"tables_used":[],"confidence":1,"notes":"x"}"#,
        );
        assert!(matches!(result, Err(GenerationError::Contract(_))));
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let result =
            parse_generation(r#"{"sql":"SELECT 1","assumptions":[],"tables_used":[],"confidence":1.5}"#);
        assert!(matches!(result, Err(GenerationError::Contract(_))));
    }

    #[test]
    fn rejects_blank_sql_and_bad_json() {
        let blank = parse_generation(r#"{"sql":"  ","assumptions":[],"tables_used":[],"confidence":0}"#);
        assert!(matches!(blank, Err(GenerationError::Contract(_))));

        assert!(matches!(parse_generation("SELECT 1"), Err(GenerationError::InvalidJson(_))));
        assert_eq!(parse_generation(""), Err(GenerationError::EmptyContent));
    }

    #[test]
    fn mock_provider_needs_no_key() {
        let config = LlmConfig {
            provider: LlmProvider::Mock,
            ..LlmConfig::default()
        };
        assert_eq!(create_generator(&config).unwrap().name(), "Mock");
    }
}
