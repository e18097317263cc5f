//! Prompt construction, SQL generation providers and the ask pipeline
//!
//! ## Features
//!
//! - `openai` - OpenAI-compatible chat completions provider (`reqwest`)
//!
//! The mock provider is always available and needs no credentials.

pub mod prompt;
pub mod generator;
pub mod openai;
pub mod mock;
pub mod pipeline;

pub use prompt::{build_prompt, response_contract, schema_subset, PromptBundle, PromptError, SYSTEM_PROMPT};
pub use generator::{create_generator, parse_generation, Generation, GenerationError, SqlGenerator};
pub use openai::OpenAiGenerator;
pub use mock::MockGenerator;
pub use pipeline::{ask, Answer, AskError};
