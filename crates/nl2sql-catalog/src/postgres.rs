//! PostgreSQL schema introspection using information_schema
//!
//! Reads tables and views, columns (with `pg_description` comments), primary
//! keys and multi-column foreign keys for a set of schemas. Every session is
//! opened with `default_transaction_read_only=on`; the health check refuses a
//! session that is not read-only.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let source = PostgresIntrospector::connect("postgres://reader@localhost/shop", false).await?;
//! let report = source.healthcheck().await?;
//! let snapshot = source.fetch_snapshot(&["public".to_string()]).await?;
//! ```
//!
//! Reference: https://www.postgresql.org/docs/current/information-schema.html

use crate::adapter::{FetchError, HealthReport, SnapshotSource};
use nl2sql_core::{Column, ForeignKey, SchemaSnapshot, Table, TableId, TableKind};
use std::collections::BTreeMap;

#[cfg(feature = "postgres")]
use crate::adapter::normalize_schemas;

#[cfg(feature = "postgres")]
use tokio_postgres::{Client, Config as PgConfig, NoTls, Row};

#[cfg(feature = "postgres")]
use postgres_native_tls::MakeTlsConnector;

#[cfg(feature = "postgres")]
use native_tls::TlsConnector;

#[cfg(not(feature = "postgres"))]
const NOT_COMPILED: &str =
    "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres";

/// Session options applied to every connection
pub const READ_ONLY_OPTIONS: &str = "-c default_transaction_read_only=on";

pub const TABLES_QUERY: &str = r#"
SELECT
  t.table_schema::text,
  t.table_name::text,
  t.table_type::text,
  pgd.description
FROM information_schema.tables AS t
LEFT JOIN pg_catalog.pg_namespace AS n
  ON n.nspname = t.table_schema
LEFT JOIN pg_catalog.pg_class AS c
  ON c.relname = t.table_name
  AND c.relnamespace = n.oid
LEFT JOIN pg_catalog.pg_description AS pgd
  ON pgd.objoid = c.oid
  AND pgd.objsubid = 0
WHERE t.table_schema = ANY($1)
  AND t.table_type IN ('BASE TABLE', 'VIEW')
ORDER BY t.table_schema, t.table_name
"#;

pub const COLUMNS_QUERY: &str = r#"
SELECT
  col.table_schema::text,
  col.table_name::text,
  col.column_name::text,
  col.data_type::text,
  col.is_nullable::text,
  pgd.description
FROM information_schema.columns AS col
LEFT JOIN pg_catalog.pg_namespace AS n
  ON n.nspname = col.table_schema
LEFT JOIN pg_catalog.pg_class AS c
  ON c.relname = col.table_name
  AND c.relnamespace = n.oid
LEFT JOIN pg_catalog.pg_attribute AS a
  ON a.attrelid = c.oid
  AND a.attname = col.column_name
LEFT JOIN pg_catalog.pg_description AS pgd
  ON pgd.objoid = c.oid
  AND pgd.objsubid = a.attnum
WHERE col.table_schema = ANY($1)
ORDER BY col.table_schema, col.table_name, col.ordinal_position
"#;

pub const PRIMARY_KEYS_QUERY: &str = r#"
SELECT
  kcu.table_schema::text,
  kcu.table_name::text,
  kcu.column_name::text
FROM information_schema.table_constraints AS tc
JOIN information_schema.key_column_usage AS kcu
  ON kcu.constraint_name = tc.constraint_name
  AND kcu.constraint_schema = tc.constraint_schema
  AND kcu.table_schema = tc.table_schema
  AND kcu.table_name = tc.table_name
WHERE tc.constraint_type = 'PRIMARY KEY'
  AND tc.table_schema = ANY($1)
ORDER BY kcu.table_schema, kcu.table_name, kcu.ordinal_position
"#;

pub const FOREIGN_KEYS_QUERY: &str = r#"
SELECT
  src.table_schema::text,
  src.table_name::text,
  src.constraint_name::text,
  src.column_name::text,
  ref.table_schema::text,
  ref.table_name::text,
  ref.column_name::text
FROM information_schema.referential_constraints AS rc
JOIN information_schema.key_column_usage AS src
  ON src.constraint_name = rc.constraint_name
  AND src.constraint_schema = rc.constraint_schema
JOIN information_schema.key_column_usage AS ref
  ON ref.constraint_name = rc.unique_constraint_name
  AND ref.constraint_schema = rc.unique_constraint_schema
  AND ref.ordinal_position = src.position_in_unique_constraint
WHERE src.table_schema = ANY($1)
ORDER BY src.table_schema, src.table_name, src.constraint_name, src.ordinal_position
"#;

pub const HEALTHCHECK_QUERY: &str = r#"
SELECT
  current_database()::text,
  current_user::text,
  current_setting('server_version'),
  current_setting('transaction_read_only')
"#;

/// `information_schema.tables` row
#[derive(Debug, Clone)]
pub(crate) struct TableRow {
    pub schema: String,
    pub name: String,
    pub table_type: String,
    pub description: Option<String>,
}

/// `information_schema.columns` row, in ordinal order
#[derive(Debug, Clone)]
pub(crate) struct ColumnRow {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub data_type: String,
    pub is_nullable: String,
    pub description: Option<String>,
}

/// Primary-key column, in key order
#[derive(Debug, Clone)]
pub(crate) struct KeyRow {
    pub schema: String,
    pub table: String,
    pub column: String,
}

/// One column pair of a foreign key, in constraint order
#[derive(Debug, Clone)]
pub(crate) struct ForeignKeyRow {
    pub schema: String,
    pub table: String,
    pub constraint: String,
    pub column: String,
    pub ref_schema: String,
    pub ref_table: String,
    pub ref_column: String,
}

/// Fold catalog rows into a sorted snapshot
///
/// Columns of relations missing from the table rows (e.g. materialized views)
/// still produce a base table so nothing the generator may see is dropped.
pub(crate) fn assemble_snapshot(
    database: String,
    tables: Vec<TableRow>,
    columns: Vec<ColumnRow>,
    keys: Vec<KeyRow>,
    foreign_keys: Vec<ForeignKeyRow>,
) -> SchemaSnapshot {
    let mut by_id: BTreeMap<TableId, Table> = BTreeMap::new();

    for row in tables {
        let mut table = Table::new(TableId::new(row.schema, row.name))
            .with_kind(TableKind::from_information_schema(&row.table_type));
        table.description = row.description;
        by_id.insert(table.id.clone(), table);
    }

    for row in columns {
        let id = TableId::new(row.schema, row.table);
        let table = by_id.entry(id.clone()).or_insert_with(|| Table::new(id));
        let mut column = Column::new(row.name, row.data_type)
            .with_nullable(row.is_nullable.eq_ignore_ascii_case("YES"));
        column.description = row.description;
        table.columns.push(column);
    }

    for row in keys {
        if let Some(table) = by_id.get_mut(&TableId::new(row.schema, row.table)) {
            table.primary_key.push(row.column);
        }
    }

    // (table, constraint) -> foreign key, columns appended in constraint order
    let mut grouped: BTreeMap<(TableId, String), ForeignKey> = BTreeMap::new();
    for row in foreign_keys {
        let key = (TableId::new(row.schema, row.table), row.constraint.clone());
        let fk = grouped.entry(key).or_insert_with(|| {
            ForeignKey::new(Vec::new(), TableId::new(row.ref_schema, row.ref_table), Vec::new())
                .with_name(row.constraint)
        });
        fk.columns.push(row.column);
        fk.referenced_columns.push(row.ref_column);
    }

    for ((id, _), fk) in grouped {
        if let Some(table) = by_id.get_mut(&id) {
            table.foreign_keys.push(fk);
        }
    }

    SchemaSnapshot::new(database, by_id.into_values().collect())
}

/// Read-only PostgreSQL catalog reader
pub struct PostgresIntrospector {
    /// PostgreSQL client (only available with postgres feature)
    #[cfg(feature = "postgres")]
    client: Client,

    /// Database name from the connection settings
    database: String,
}

impl PostgresIntrospector {
    /// Connect with a `postgres://` URL or key/value connection string
    ///
    /// The session is forced read-only. With `tls` the connection goes
    /// through native-tls; otherwise it is plain TCP.
    #[cfg(feature = "postgres")]
    pub async fn connect(dsn: &str, tls: bool) -> Result<Self, FetchError> {
        let mut config: PgConfig = dsn
            .parse()
            .map_err(|e| FetchError::ConfigError(format!("Invalid connection string: {}", e)))?;
        config
            .options(READ_ONLY_OPTIONS)
            .connect_timeout(std::time::Duration::from_secs(5));

        let database = config.get_dbname().unwrap_or("postgres").to_string();

        let client = if tls {
            let connector = TlsConnector::builder()
                .build()
                .map_err(|e| FetchError::ConfigError(format!("Failed to create TLS connector: {}", e)))?;

            let (client, connection) = config
                .connect(MakeTlsConnector::new(connector))
                .await
                .map_err(|e| FetchError::AuthenticationError(format!("Failed to connect with TLS: {}", e)))?;

            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL TLS connection error");
                }
            });
            client
        } else {
            let (client, connection) = config
                .connect(NoTls)
                .await
                .map_err(|e| FetchError::AuthenticationError(format!("Failed to connect: {}", e)))?;

            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL connection error");
                }
            });
            client
        };

        tracing::debug!(%database, tls, "connected to PostgreSQL");
        Ok(Self { client, database })
    }

    /// Create introspector without postgres feature (returns error)
    #[cfg(not(feature = "postgres"))]
    pub async fn connect(_dsn: &str, _tls: bool) -> Result<Self, FetchError> {
        Err(FetchError::ConfigError(NOT_COMPILED.to_string()))
    }

    /// Database name from the connection settings
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Report database, user, server version and read-only status
    ///
    /// Fails with [`FetchError::NotReadOnly`] when the session can write.
    #[cfg(feature = "postgres")]
    pub async fn healthcheck(&self) -> Result<HealthReport, FetchError> {
        let row = self
            .client
            .query_one(HEALTHCHECK_QUERY, &[])
            .await
            .map_err(map_query_error)?;

        let read_only: String = get(&row, 3)?;
        let report = HealthReport {
            database: get(&row, 0)?,
            user: get(&row, 1)?,
            server_version: get(&row, 2)?,
            read_only: read_only == "on",
        };

        if !report.read_only {
            return Err(FetchError::NotReadOnly(format!(
                "transaction_read_only={} for user {}",
                read_only, report.user
            )));
        }

        Ok(report)
    }

    #[cfg(not(feature = "postgres"))]
    pub async fn healthcheck(&self) -> Result<HealthReport, FetchError> {
        Err(FetchError::ConfigError(NOT_COMPILED.to_string()))
    }
}

#[cfg(feature = "postgres")]
fn map_query_error(e: tokio_postgres::Error) -> FetchError {
    let message = e.to_string();
    if message.contains("permission denied") {
        FetchError::PermissionDenied(message)
    } else {
        FetchError::QueryError(message)
    }
}

#[cfg(feature = "postgres")]
fn get<'a, T: tokio_postgres::types::FromSql<'a>>(row: &'a Row, index: usize) -> Result<T, FetchError> {
    row.try_get(index)
        .map_err(|e| FetchError::InvalidResponse(format!("column {}: {}", index, e)))
}

#[async_trait::async_trait]
impl SnapshotSource for PostgresIntrospector {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    #[cfg(feature = "postgres")]
    async fn fetch_snapshot(&self, schemas: &[String]) -> Result<SchemaSnapshot, FetchError> {
        let schemas = normalize_schemas(schemas);
        if schemas.is_empty() {
            return Err(FetchError::ConfigError(
                "No target schemas selected for introspection".to_string(),
            ));
        }

        let row = self
            .client
            .query_one("SELECT current_database()::text", &[])
            .await
            .map_err(map_query_error)?;
        let database: String = get(&row, 0)?;

        let mut tables = Vec::new();
        for row in self.client.query(TABLES_QUERY, &[&schemas]).await.map_err(map_query_error)? {
            tables.push(TableRow {
                schema: get(&row, 0)?,
                name: get(&row, 1)?,
                table_type: get(&row, 2)?,
                description: get(&row, 3)?,
            });
        }

        let mut columns = Vec::new();
        for row in self.client.query(COLUMNS_QUERY, &[&schemas]).await.map_err(map_query_error)? {
            columns.push(ColumnRow {
                schema: get(&row, 0)?,
                table: get(&row, 1)?,
                name: get(&row, 2)?,
                data_type: get(&row, 3)?,
                is_nullable: get(&row, 4)?,
                description: get(&row, 5)?,
            });
        }

        let mut keys = Vec::new();
        for row in self.client.query(PRIMARY_KEYS_QUERY, &[&schemas]).await.map_err(map_query_error)? {
            keys.push(KeyRow {
                schema: get(&row, 0)?,
                table: get(&row, 1)?,
                column: get(&row, 2)?,
            });
        }

        let mut foreign_keys = Vec::new();
        for row in self.client.query(FOREIGN_KEYS_QUERY, &[&schemas]).await.map_err(map_query_error)? {
            foreign_keys.push(ForeignKeyRow {
                schema: get(&row, 0)?,
                table: get(&row, 1)?,
                constraint: get(&row, 2)?,
                column: get(&row, 3)?,
                ref_schema: get(&row, 4)?,
                ref_table: get(&row, 5)?,
                ref_column: get(&row, 6)?,
            });
        }

        tracing::info!(
            %database,
            schemas = ?schemas,
            tables = tables.len(),
            columns = columns.len(),
            foreign_keys = foreign_keys.len(),
            "introspected PostgreSQL catalog"
        );

        Ok(assemble_snapshot(database, tables, columns, keys, foreign_keys))
    }

    #[cfg(not(feature = "postgres"))]
    async fn fetch_snapshot(&self, _schemas: &[String]) -> Result<SchemaSnapshot, FetchError> {
        Err(FetchError::ConfigError(NOT_COMPILED.to_string()))
    }

    async fn test_connection(&self) -> Result<HealthReport, FetchError> {
        self.healthcheck().await
    }
}
