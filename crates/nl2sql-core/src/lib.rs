//! pg-nl2sql Core
//!
//! Core domain model shared by retrieval, validation and generation.
//! Never rename error-kind codes - they are part of the public API.

pub mod diagnostic;
pub mod schema;
pub mod graph;
pub mod policy;
pub mod config;

pub use diagnostic::{Diagnostic, ErrorKind, Severity};
pub use schema::{Column, ForeignKey, SchemaSnapshot, Table, TableId, TableKind};
pub use graph::{SchemaError, SchemaGraph, SchemaHandle};
pub use policy::Policy;
pub use config::{
    CacheConfig, Config, ConfigError, DatabaseConfig, GuardrailConfig, LlmConfig, LlmProvider,
    RetrievalConfig, TableRules,
};
