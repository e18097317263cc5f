//! Schema-aware table retrieval
//!
//! Scores tables lexically against a question and widens the result by one
//! foreign-key hop, under the policy's allowlist and table cap.

pub mod tokenize;
pub mod retriever;

pub use tokenize::tokenize;
pub use retriever::{retrieve, Reason, RetrievalResult, RetrievedTable};
