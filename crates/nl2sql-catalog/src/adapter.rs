//! Snapshot source trait for reading catalog metadata

use nl2sql_core::SchemaSnapshot;
use serde::Serialize;

/// Errors that can occur when reading catalog metadata
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Session is not read-only: {0}")]
    NotReadOnly(String),
}

/// Result of a connection health check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub database: String,
    pub user: String,
    pub server_version: String,
    pub read_only: bool,
}

/// Source of schema snapshots (a live database, or canned data in tests)
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Get the source name (e.g., "PostgreSQL")
    fn name(&self) -> &'static str;

    /// Read tables, columns, primary keys and foreign keys of `schemas`
    ///
    /// The returned snapshot is sorted by table identifier.
    async fn fetch_snapshot(&self, schemas: &[String]) -> Result<SchemaSnapshot, FetchError>;

    /// Check that the source is reachable and the session is read-only
    async fn test_connection(&self) -> Result<HealthReport, FetchError>;
}

/// Trimmed, de-duplicated, sorted schema names; system schemas removed
pub fn normalize_schemas(schemas: &[String]) -> Vec<String> {
    let mut names: Vec<String> = schemas
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "pg_catalog" && s != "information_schema")
        .collect();
    names.sort();
    names.dedup();
    names
}
