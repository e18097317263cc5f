//! Canned generator for tests and offline demos
//!
//! Queued responses are returned in order. Once the queue is empty the
//! generator falls back to a deterministic query over the top-ranked table
//! of the prompt, so the full pipeline runs without network access.
//!
//! ```rust,ignore
//! let generator = MockGenerator::new()
//!     .with_raw(r#"{"sql":"SELECT 1","assumptions":[],"tables_used":[],"confidence":1}"#)
//!     .with_failure(GenerationError::Timeout(30));
//! ```

use crate::generator::{parse_generation, Generation, GenerationError, SqlGenerator};
use crate::prompt::PromptBundle;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One queued reply
#[derive(Debug, Clone)]
enum Reply {
    /// Raw message content, parsed like a provider response
    Raw(String),
    Error(GenerationError),
}

pub struct MockGenerator {
    replies: Arc<Mutex<VecDeque<Reply>>>,

    /// User prompts received, in call order
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a well-formed generation
    pub fn with_generation(self, generation: &Generation) -> Self {
        let raw = serde_json::to_string(generation).unwrap_or_default();
        self.with_raw(raw)
    }

    /// Queue raw message content (may violate the contract)
    pub fn with_raw(self, content: impl Into<String>) -> Self {
        self.push(Reply::Raw(content.into()))
    }

    /// Queue a provider error
    pub fn with_failure(self, error: GenerationError) -> Self {
        self.push(Reply::Error(error))
    }

    fn push(self, reply: Reply) -> Self {
        // Builder methods run before the generator is shared
        if let Ok(mut replies) = self.replies.try_lock() {
            replies.push_back(reply);
        }
        self
    }

    /// User prompts received so far
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.prompts.lock().await.len()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockGenerator {
    fn clone(&self) -> Self {
        Self {
            replies: Arc::clone(&self.replies),
            prompts: Arc::clone(&self.prompts),
        }
    }
}

/// `SELECT <columns> FROM <top table> AS t` with the prompt's LIMIT
fn fallback(prompt: &PromptBundle) -> Result<Generation, GenerationError> {
    let table = prompt.tables.first().ok_or(GenerationError::EmptyContent)?;

    let columns: Vec<String> = table
        .columns
        .iter()
        .take(5)
        .map(|c| format!("t.{}", c.name))
        .collect();
    let projection = if columns.is_empty() {
        "COUNT(*) AS row_count".to_string()
    } else {
        columns.join(", ")
    };

    let limit = if columns.is_empty() {
        String::new()
    } else {
        format!(" LIMIT {}", prompt.default_limit)
    };

    Ok(Generation {
        sql: format!("SELECT {} FROM {} AS t{}", projection, table.id, limit),
        assumptions: vec![format!("Mock generator read from {}", table.id)],
        tables_used: vec![table.id.to_string()],
        confidence: 0.5,
    })
}

#[async_trait::async_trait]
impl SqlGenerator for MockGenerator {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn generate(&self, prompt: &PromptBundle) -> Result<Generation, GenerationError> {
        self.prompts.lock().await.push(prompt.user_prompt.clone());

        match self.replies.lock().await.pop_front() {
            Some(Reply::Raw(content)) => parse_generation(&content),
            Some(Reply::Error(error)) => Err(error),
            None => fallback(prompt),
        }
    }
}
