//! Question to reviewed SQL: retrieve, prompt, generate, validate
//!
//! The generated statement is validated against the retrieved subset only:
//! the policy's allowlist is narrowed to the retrieval result, so a
//! generator that reaches for a table it was not shown gets rejected even
//! when that table exists in the schema.

use crate::generator::{Generation, GenerationError, SqlGenerator};
use crate::prompt::{build_prompt, PromptError};
use nl2sql_core::{Policy, SchemaGraph};
use nl2sql_retrieval::{retrieve, RetrievalResult};
use nl2sql_sql::{Guardrail, ValidationResult};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),
}

/// Result of one question, ready for human review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub question: String,

    pub retrieval: RetrievalResult,

    pub generation: Generation,

    pub validation: ValidationResult,

    /// Retrieval reasons followed by the generator's own assumptions
    pub assumptions: Vec<String>,
}

impl Answer {
    pub fn is_accepted(&self) -> bool {
        self.validation.is_accepted()
    }

    /// Safe SQL, only when validation accepted the generation
    pub fn sql(&self) -> Option<&str> {
        self.validation.sql()
    }
}

/// Answer `question` with `generator`, validating the result
pub async fn ask(
    question: &str,
    graph: &SchemaGraph,
    policy: &Policy,
    generator: &dyn SqlGenerator,
) -> Result<Answer, AskError> {
    let retrieval = retrieve(question, graph, policy);
    let prompt = build_prompt(question, &retrieval, graph, policy)?;

    let generation = generator.generate(&prompt).await?;

    let subset_policy = policy.restricted_to(retrieval.table_ids());
    let validation = Guardrail::new(graph).validate_sql(&generation.sql, &subset_policy);

    if let ValidationResult::Rejected(rejected) = &validation {
        let codes: Vec<&str> = rejected.errors.iter().map(|d| d.kind.as_str()).collect();
        tracing::warn!(
            generator = generator.name(),
            errors = ?codes,
            "generated SQL rejected"
        );
    }

    let mut assumptions = prompt.assumptions.clone();
    for assumption in &generation.assumptions {
        if !assumptions.contains(assumption) {
            assumptions.push(assumption.clone());
        }
    }

    Ok(Answer {
        question: prompt.question,
        retrieval,
        generation,
        validation,
        assumptions,
    })
}
