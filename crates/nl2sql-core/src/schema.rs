//! Schema snapshot types
//!
//! Plain data as read from the database catalog. Validation of the
//! relationships between tables happens when a [`SchemaGraph`] is built.
//!
//! [`SchemaGraph`]: crate::graph::SchemaGraph

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Qualified table identifier (`schema.name`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId {
    /// Schema (namespace) name
    pub schema: String,

    /// Unqualified table name
    pub name: String,
}

impl TableId {
    /// Create a new table identifier
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parse `schema.name`, or a bare `name` placed in `default_schema`
    pub fn parse_with_default(text: &str, default_schema: &str) -> Result<Self, InvalidTableId> {
        match text.trim().split_once('.') {
            Some(_) => text.parse(),
            None if !text.trim().is_empty() => Ok(Self::new(default_schema, text.trim())),
            None => Err(InvalidTableId(text.to_string())),
        }
    }

    /// Fully qualified name
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl FromStr for TableId {
    type Err = InvalidTableId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (schema, name) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| InvalidTableId(s.to_string()))?;

        if schema.is_empty() || name.is_empty() || name.contains('.') {
            return Err(InvalidTableId(s.to_string()));
        }

        Ok(Self::new(schema, name))
    }
}

/// Returned when a string is not a `schema.name` identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid table identifier '{0}', expected schema.name")]
pub struct InvalidTableId(pub String);

/// Relation kind as reported by `information_schema.tables`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    #[default]
    BaseTable,
    View,
}

impl TableKind {
    /// Map an `information_schema` table_type value
    pub fn from_information_schema(value: &str) -> Self {
        match value.to_uppercase().as_str() {
            "VIEW" => Self::View,
            _ => Self::BaseTable,
        }
    }
}

/// A column in a table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,

    /// Declared type, kept as the catalog reports it
    pub data_type: String,

    /// Whether NULL is allowed
    pub nullable: bool,

    /// Column comment
    #[serde(default)]
    pub description: Option<String>,
}

impl Column {
    /// Create a nullable column without a description
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            description: None,
        }
    }

    /// Set nullability
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Column-list foreign key owned by its source table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name
    #[serde(default)]
    pub name: Option<String>,

    /// Local columns, in constraint order
    pub columns: Vec<String>,

    /// Target table
    pub references: TableId,

    /// Target columns, same arity as `columns`
    pub referenced_columns: Vec<String>,
}

impl ForeignKey {
    pub fn new(
        columns: Vec<String>,
        references: TableId,
        referenced_columns: Vec<String>,
    ) -> Self {
        Self {
            name: None,
            columns,
            references,
            referenced_columns,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A table or view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Qualified identifier
    pub id: TableId,

    /// Base table or view
    #[serde(default)]
    pub kind: TableKind,

    /// Table comment
    #[serde(default)]
    pub description: Option<String>,

    /// Columns in ordinal order
    pub columns: Vec<Column>,

    /// Primary-key column names, in key order
    #[serde(default)]
    pub primary_key: Vec<String>,

    /// Outgoing foreign keys
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// Create an empty base table
    pub fn new(id: TableId) -> Self {
        Self {
            id,
            kind: TableKind::BaseTable,
            description: None,
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: TableKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Look up a column by exact name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column names in ordinal order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Raw catalog snapshot, before graph validation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Database name
    pub database: String,

    /// Tables, sorted by identifier when produced by the catalog
    pub tables: Vec<Table>,
}

impl SchemaSnapshot {
    pub fn new(database: impl Into<String>, tables: Vec<Table>) -> Self {
        Self {
            database: database.into(),
            tables,
        }
    }

    /// Sort tables by identifier so serialized snapshots are stable
    pub fn sorted(mut self) -> Self {
        self.tables.sort_by(|a, b| a.id.cmp(&b.id));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_id_parsing() {
        let id: TableId = "public.orders".parse().unwrap();
        assert_eq!(id, TableId::new("public", "orders"));
        assert_eq!(id.to_string(), "public.orders");

        assert!("orders".parse::<TableId>().is_err());
        assert!("a.b.c".parse::<TableId>().is_err());
        assert!(".orders".parse::<TableId>().is_err());
    }

    #[test]
    fn table_id_with_default_schema() {
        let id = TableId::parse_with_default("orders", "sales").unwrap();
        assert_eq!(id.qualified(), "sales.orders");

        let id = TableId::parse_with_default("public.orders", "sales").unwrap();
        assert_eq!(id.qualified(), "public.orders");

        assert!(TableId::parse_with_default("  ", "sales").is_err());
    }

    #[test]
    fn table_column_lookup() {
        let table = Table::new(TableId::new("public", "orders"))
            .with_column(Column::new("id", "integer").with_nullable(false))
            .with_column(Column::new("status", "text"));

        assert!(table.has_column("status"));
        assert!(!table.has_column("total"));
        assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["id", "status"]);
        assert!(!table.column("id").unwrap().nullable);
    }

    #[test]
    fn table_kind_mapping() {
        assert_eq!(TableKind::from_information_schema("VIEW"), TableKind::View);
        assert_eq!(TableKind::from_information_schema("BASE TABLE"), TableKind::BaseTable);
    }
}
