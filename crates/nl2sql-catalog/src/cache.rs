//! Versioned on-disk schema cache
//!
//! The cache is a JSON envelope around a [`SchemaSnapshot`]:
//!
//! ```json
//! {
//!   "cache_format_version": "1.0",
//!   "generated_at": "2026-01-31T09:12:44Z",
//!   "fingerprint": "<sha256 of the snapshot>",
//!   "snapshot": { "database": "shop", "tables": [ ... ] }
//! }
//! ```
//!
//! Loading checks the version and recomputes the fingerprint, so a cache
//! edited by hand is rejected instead of silently trusted.

use crate::adapter::{FetchError, SnapshotSource};
use chrono::{DateTime, SecondsFormat, Utc};
use nl2sql_core::{SchemaError, SchemaGraph, SchemaHandle, SchemaSnapshot};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Current cache envelope version
pub const CACHE_FORMAT_VERSION: &str = "1.0";

/// Errors reading, writing or refreshing the cache
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Schema cache not found at {0}. Run refresh-schema first.")]
    Missing(PathBuf),

    #[error("Failed to access schema cache {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema cache {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported cache format version '{found}', expected '{expected}'")]
    Version { found: String, expected: String },

    #[error("Schema cache fingerprint mismatch (stored {stored}, computed {computed})")]
    Fingerprint { stored: String, computed: String },

    #[error("Schema introspection failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Invalid schema snapshot: {0}")]
    Schema(#[from] SchemaError),
}

/// Cache file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    pub cache_format_version: String,

    pub generated_at: DateTime<Utc>,

    /// SHA-256 hex digest of the canonical snapshot JSON
    pub fingerprint: String,

    pub snapshot: SchemaSnapshot,
}

impl CachedSnapshot {
    /// Wrap a snapshot, stamping it with the current time
    pub fn new(snapshot: SchemaSnapshot) -> Result<Self, CacheError> {
        let snapshot = snapshot.sorted();
        let fingerprint = snapshot_fingerprint(&snapshot)?;
        Ok(Self {
            cache_format_version: CACHE_FORMAT_VERSION.to_string(),
            generated_at: Utc::now(),
            fingerprint,
            snapshot,
        })
    }

    /// `generated_at` as RFC 3339 with second precision
    pub fn generated_at_label(&self) -> String {
        self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Validate the snapshot into a schema graph
    pub fn into_graph(self) -> Result<SchemaGraph, CacheError> {
        Ok(SchemaGraph::from_snapshot(self.snapshot)?)
    }
}

/// SHA-256 hex digest of the snapshot with tables sorted by identifier
pub fn snapshot_fingerprint(snapshot: &SchemaSnapshot) -> Result<String, CacheError> {
    let canonical = snapshot.clone().sorted();
    let bytes = serde_json::to_vec(&canonical).map_err(|source| CacheError::Json {
        path: PathBuf::new(),
        source,
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Write `snapshot` to `path`, creating parent directories
pub fn save_cache(path: &Path, snapshot: SchemaSnapshot) -> Result<CachedSnapshot, CacheError> {
    let cached = CachedSnapshot::new(snapshot)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| CacheError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(&cached).map_err(|source| CacheError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(
        path = %path.display(),
        tables = cached.snapshot.tables.len(),
        fingerprint = %cached.fingerprint,
        "wrote schema cache"
    );

    Ok(cached)
}

/// Read and verify the cache at `path`
pub fn load_cache(path: &Path) -> Result<CachedSnapshot, CacheError> {
    if !path.exists() {
        return Err(CacheError::Missing(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    // Version first, so a future layout reports a version error instead of a
    // field-level parse failure
    let raw: serde_json::Value = serde_json::from_str(&content).map_err(|source| CacheError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let version = raw
        .get("cache_format_version")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if version != CACHE_FORMAT_VERSION {
        return Err(CacheError::Version {
            found: version.to_string(),
            expected: CACHE_FORMAT_VERSION.to_string(),
        });
    }

    let cached: CachedSnapshot = serde_json::from_value(raw).map_err(|source| CacheError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let computed = snapshot_fingerprint(&cached.snapshot)?;
    if computed != cached.fingerprint {
        return Err(CacheError::Fingerprint {
            stored: cached.fingerprint,
            computed,
        });
    }

    tracing::debug!(path = %path.display(), tables = cached.snapshot.tables.len(), "loaded schema cache");
    Ok(cached)
}

/// Load the cache and build its graph
pub fn load_graph(path: &Path) -> Result<SchemaGraph, CacheError> {
    load_cache(path)?.into_graph()
}

/// Introspect, validate, persist, then swap the new graph into `handle`
///
/// Nothing is written and the handle is untouched when introspection or
/// graph validation fails.
pub async fn refresh(
    source: &dyn SnapshotSource,
    schemas: &[String],
    path: &Path,
    handle: Option<&SchemaHandle>,
) -> Result<CachedSnapshot, CacheError> {
    let snapshot = source.fetch_snapshot(schemas).await?;
    let graph = SchemaGraph::from_snapshot(snapshot)?;

    let cached = save_cache(path, graph.to_snapshot())?;

    if let Some(handle) = handle {
        let previous = handle.replace(graph);
        tracing::info!(
            source = source.name(),
            previous_tables = previous.len(),
            tables = cached.snapshot.tables.len(),
            "refreshed schema graph"
        );
    } else {
        tracing::info!(
            source = source.name(),
            tables = cached.snapshot.tables.len(),
            "refreshed schema cache"
        );
    }

    Ok(cached)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl2sql_core::{Column, Table, TableId};

    fn snapshot() -> SchemaSnapshot {
        SchemaSnapshot::new(
            "shop",
            vec![
                Table::new(TableId::new("public", "orders")).with_column(Column::new("id", "integer")),
                Table::new(TableId::new("public", "customers")).with_column(Column::new("id", "integer")),
            ],
        )
    }

    #[test]
    fn fingerprint_ignores_table_order() {
        let mut reversed = snapshot();
        reversed.tables.reverse();
        assert_eq!(
            snapshot_fingerprint(&snapshot()).unwrap(),
            snapshot_fingerprint(&reversed).unwrap()
        );
    }

    #[test]
    fn envelope_is_sorted_and_versioned() {
        let cached = CachedSnapshot::new(snapshot()).unwrap();
        assert_eq!(cached.cache_format_version, CACHE_FORMAT_VERSION);
        assert_eq!(cached.snapshot.tables[0].id.name, "customers");
        assert_eq!(cached.fingerprint.len(), 64);
        assert!(cached.generated_at_label().ends_with('Z'));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("schema_cache.json");

        let saved = save_cache(&path, snapshot()).unwrap();
        let loaded = load_cache(&path).unwrap();
        assert_eq!(saved, loaded);

        let graph = loaded.into_graph().unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_cache(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(CacheError::Missing(_))));
    }
}
