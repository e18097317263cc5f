//! In-memory snapshot source for testing
//!
//! Serves predefined tables without connecting to a database. Useful for
//! unit tests of refresh and cache logic, demos without credentials, and
//! simulating catalog failures.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nl2sql_catalog::{MockSource, SnapshotSource};
//! use nl2sql_core::{Column, Table, TableId};
//!
//! let source = MockSource::new("shop");
//! source
//!     .add_table(Table::new(TableId::new("public", "orders")).with_column(Column::new("id", "integer")))
//!     .await;
//!
//! let snapshot = source.fetch_snapshot(&["public".to_string()]).await?;
//! ```
//!
//! ## Simulating Failures
//!
//! ```rust,ignore
//! // Health check fails
//! let source = MockSource::new("shop").with_connection_failure();
//!
//! // Health check reports a writable session
//! let source = MockSource::new("shop").with_writable_session();
//!
//! // 100ms delay on every call
//! let source = MockSource::new("shop").with_latency(100);
//! ```

use crate::adapter::{normalize_schemas, FetchError, HealthReport, SnapshotSource};
use nl2sql_core::{SchemaSnapshot, Table, TableId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Mock snapshot source
///
/// State is shared between clones, so a test can keep a handle and mutate
/// the catalog between two refreshes.
pub struct MockSource {
    /// Database name reported in snapshots and health checks
    database: String,

    /// Predefined tables
    tables: Arc<RwLock<BTreeMap<TableId, Table>>>,

    /// Errors to return when a schema is requested
    errors: Arc<RwLock<HashMap<String, FetchError>>>,

    /// Simulate connection failure
    fail_connection: bool,

    /// Report `transaction_read_only=off`
    writable: bool,

    /// Simulated latency (milliseconds)
    latency_ms: u64,

    source_name: &'static str,
}

impl MockSource {
    /// Create an empty source
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            tables: Arc::new(RwLock::new(BTreeMap::new())),
            errors: Arc::new(RwLock::new(HashMap::new())),
            fail_connection: false,
            writable: false,
            latency_ms: 0,
            source_name: "Mock",
        }
    }

    /// Create a source serving every table of `snapshot`
    pub fn from_snapshot(snapshot: SchemaSnapshot) -> Self {
        let source = Self::new(snapshot.database);
        let tables = snapshot
            .tables
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();
        Self {
            tables: Arc::new(RwLock::new(tables)),
            ..source
        }
    }

    /// Add or replace a table
    pub async fn add_table(&self, table: Table) {
        self.tables.write().await.insert(table.id.clone(), table);
    }

    /// Remove a table, returning it if present
    pub async fn remove_table(&self, id: &TableId) -> Option<Table> {
        self.tables.write().await.remove(id)
    }

    /// Fail any fetch that includes `schema`
    pub async fn add_error_for_schema(&self, schema: impl Into<String>, error: FetchError) {
        self.errors.write().await.insert(schema.into(), error);
    }

    pub async fn clear_errors(&self) {
        self.errors.write().await.clear();
    }

    pub async fn table_count(&self) -> usize {
        self.tables.read().await.len()
    }

    /// Make `test_connection()` fail with a network error
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Make `test_connection()` report a session that can write
    pub fn with_writable_session(mut self) -> Self {
        self.writable = true;
        self
    }

    /// Delay every call by `latency_ms`
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.source_name = name;
        self
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }
}

impl Clone for MockSource {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            tables: Arc::clone(&self.tables),
            errors: Arc::clone(&self.errors),
            fail_connection: self.fail_connection,
            writable: self.writable,
            latency_ms: self.latency_ms,
            source_name: self.source_name,
        }
    }
}

#[async_trait::async_trait]
impl SnapshotSource for MockSource {
    fn name(&self) -> &'static str {
        self.source_name
    }

    async fn fetch_snapshot(&self, schemas: &[String]) -> Result<SchemaSnapshot, FetchError> {
        self.simulate_latency().await;

        let schemas = normalize_schemas(schemas);
        if schemas.is_empty() {
            return Err(FetchError::ConfigError(
                "No target schemas selected for introspection".to_string(),
            ));
        }

        let errors = self.errors.read().await;
        if let Some(error) = schemas.iter().find_map(|s| errors.get(s)) {
            return Err(error.clone());
        }

        let tables = self
            .tables
            .read()
            .await
            .values()
            .filter(|t| schemas.contains(&t.id.schema))
            .cloned()
            .collect();

        Ok(SchemaSnapshot::new(self.database.clone(), tables))
    }

    async fn test_connection(&self) -> Result<HealthReport, FetchError> {
        self.simulate_latency().await;

        if self.fail_connection {
            return Err(FetchError::NetworkError(
                "Simulated connection failure".to_string(),
            ));
        }

        if self.writable {
            return Err(FetchError::NotReadOnly(
                "transaction_read_only=off for user mock".to_string(),
            ));
        }

        Ok(HealthReport {
            database: self.database.clone(),
            user: "mock".to_string(),
            server_version: "16.0".to_string(),
            read_only: true,
        })
    }
}

/// Builder for a [`MockSource`] with several tables
///
/// ```rust,ignore
/// let source = MockSourceBuilder::new("shop")
///     .with_table(customers())
///     .with_table(orders())
///     .with_latency(50)
///     .build();
/// ```
pub struct MockSourceBuilder {
    database: String,
    tables: BTreeMap<TableId, Table>,
    errors: HashMap<String, FetchError>,
    fail_connection: bool,
    writable: bool,
    latency_ms: u64,
    source_name: &'static str,
}

impl MockSourceBuilder {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            tables: BTreeMap::new(),
            errors: HashMap::new(),
            fail_connection: false,
            writable: false,
            latency_ms: 0,
            source_name: "Mock",
        }
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.insert(table.id.clone(), table);
        self
    }

    pub fn with_error(mut self, schema: impl Into<String>, error: FetchError) -> Self {
        self.errors.insert(schema.into(), error);
        self
    }

    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    pub fn with_writable_session(mut self) -> Self {
        self.writable = true;
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.source_name = name;
        self
    }

    pub fn build(self) -> MockSource {
        MockSource {
            database: self.database,
            tables: Arc::new(RwLock::new(self.tables)),
            errors: Arc::new(RwLock::new(self.errors)),
            fail_connection: self.fail_connection,
            writable: self.writable,
            latency_ms: self.latency_ms,
            source_name: self.source_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl2sql_core::Column;

    fn table(schema: &str, name: &str) -> Table {
        Table::new(TableId::new(schema, name)).with_column(Column::new("id", "integer"))
    }

    fn schemas(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_fetch_filters_by_schema() {
        let source = MockSourceBuilder::new("shop")
            .with_table(table("public", "orders"))
            .with_table(table("public", "customers"))
            .with_table(table("audit", "events"))
            .build();

        let snapshot = source.fetch_snapshot(&schemas(&["public"])).await.unwrap();
        let names: Vec<_> = snapshot.tables.iter().map(|t| t.id.to_string()).collect();
        assert_eq!(names, vec!["public.customers", "public.orders"]);
        assert_eq!(snapshot.database, "shop");
    }

    #[tokio::test]
    async fn test_fetch_without_schemas_fails() {
        let source = MockSource::new("shop");
        let result = source.fetch_snapshot(&schemas(&["pg_catalog"])).await;
        assert!(matches!(result, Err(FetchError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_schema_error() {
        let source = MockSource::new("shop");
        source
            .add_error_for_schema("audit", FetchError::PermissionDenied("schema audit".into()))
            .await;

        let result = source.fetch_snapshot(&schemas(&["public", "audit"])).await;
        assert!(matches!(result, Err(FetchError::PermissionDenied(_))));

        source.clear_errors().await;
        assert!(source.fetch_snapshot(&schemas(&["audit"])).await.is_ok());
    }

    #[tokio::test]
    async fn test_connection_outcomes() {
        let report = MockSource::new("shop").test_connection().await.unwrap();
        assert!(report.read_only);
        assert_eq!(report.database, "shop");

        let failing = MockSource::new("shop").with_connection_failure();
        assert!(matches!(failing.test_connection().await, Err(FetchError::NetworkError(_))));

        let writable = MockSource::new("shop").with_writable_session();
        assert!(matches!(writable.test_connection().await, Err(FetchError::NotReadOnly(_))));
    }

    #[tokio::test]
    async fn test_clone_shares_tables() {
        let source = MockSource::new("shop");
        let cloned = source.clone();

        source.add_table(table("public", "orders")).await;
        assert_eq!(cloned.table_count().await, 1);

        cloned.remove_table(&TableId::new("public", "orders")).await;
        assert_eq!(source.table_count().await, 0);
    }

    #[tokio::test]
    async fn test_from_snapshot_and_name() {
        let snapshot = SchemaSnapshot::new("shop", vec![table("public", "orders")]);
        let source = MockSource::from_snapshot(snapshot).with_name("FakePostgres");

        assert_eq!(source.name(), "FakePostgres");
        assert_eq!(source.table_count().await, 1);
    }
}
