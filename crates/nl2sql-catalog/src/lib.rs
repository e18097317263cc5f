//! PostgreSQL catalog introspection and the on-disk schema cache
//!
//! Reads tables, columns, primary keys and foreign keys through
//! `information_schema` on a read-only session, and persists the resulting
//! snapshot as a versioned, fingerprinted JSON file.
//!
//! ## Features
//!
//! - `postgres` - live PostgreSQL introspection (`tokio-postgres`, optional TLS)
//!
//! Without the feature, [`PostgresIntrospector`] returns a configuration
//! error and only [`MockSource`] and cached snapshots are usable.
//!
//! ## Example
//!
//! ```rust,ignore
//! use nl2sql_catalog::{refresh, PostgresIntrospector};
//!
//! let source = PostgresIntrospector::connect(dsn, false).await?;
//! source.healthcheck().await?;
//! refresh(&source, &["public".to_string()], Path::new("data/schema_cache.json"), None).await?;
//! ```

pub mod adapter;
pub mod postgres;
pub mod mock;
pub mod cache;

pub use adapter::{normalize_schemas, FetchError, HealthReport, SnapshotSource};
pub use postgres::PostgresIntrospector;
pub use mock::{MockSource, MockSourceBuilder};
pub use cache::{
    load_cache, load_graph, refresh, save_cache, snapshot_fingerprint, CacheError, CachedSnapshot,
    CACHE_FORMAT_VERSION,
};
