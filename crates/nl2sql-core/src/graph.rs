//! Schema graph construction and foreign-key adjacency
//!
//! The graph is immutable once built. A refresh builds a new graph and swaps
//! it into a [`SchemaHandle`]; readers holding the previous `Arc` keep using
//! it until they drop it.

use crate::schema::{SchemaSnapshot, Table, TableId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

static NO_NEIGHBORS: BTreeSet<TableId> = BTreeSet::new();

/// Errors raised while building a schema graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("Foreign key on {table}({column}) references a table that is not in the snapshot")]
    DanglingForeignKey { table: String, column: String },

    #[error("Duplicate table: {0}")]
    DuplicateTable(String),

    #[error("Duplicate column {column} on table {table}")]
    DuplicateColumn { table: String, column: String },

    #[error("Foreign key {constraint} on {table} has mismatched column lists")]
    ForeignKeyArity { table: String, constraint: String },
}

/// Immutable schema graph with one-hop foreign-key adjacency
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    database: String,

    tables: BTreeMap<TableId, Table>,

    /// table -> tables reachable by one foreign-key hop, either direction
    adjacency: HashMap<TableId, BTreeSet<TableId>>,

    /// unqualified name -> identifiers carrying that name
    by_name: HashMap<String, Vec<TableId>>,
}

impl SchemaGraph {
    /// Build a graph, validating table, column and foreign-key integrity
    pub fn build(database: impl Into<String>, tables: Vec<Table>) -> Result<Self, SchemaError> {
        let database = database.into();
        let mut by_id: BTreeMap<TableId, Table> = BTreeMap::new();

        for table in tables {
            let mut seen = HashSet::new();
            for column in &table.columns {
                if !seen.insert(column.name.as_str()) {
                    return Err(SchemaError::DuplicateColumn {
                        table: table.id.to_string(),
                        column: column.name.clone(),
                    });
                }
            }

            if by_id.contains_key(&table.id) {
                return Err(SchemaError::DuplicateTable(table.id.to_string()));
            }
            by_id.insert(table.id.clone(), table);
        }

        let mut adjacency: HashMap<TableId, BTreeSet<TableId>> = HashMap::new();
        let mut edges = 0usize;

        for table in by_id.values() {
            for fk in &table.foreign_keys {
                if fk.columns.is_empty() || fk.columns.len() != fk.referenced_columns.len() {
                    return Err(SchemaError::ForeignKeyArity {
                        table: table.id.to_string(),
                        constraint: fk.name.clone().unwrap_or_else(|| fk.columns.join(",")),
                    });
                }

                if !by_id.contains_key(&fk.references) {
                    return Err(SchemaError::DanglingForeignKey {
                        table: table.id.to_string(),
                        column: fk.columns.join(","),
                    });
                }

                // Self-references never widen retrieval
                if fk.references == table.id {
                    continue;
                }

                adjacency
                    .entry(table.id.clone())
                    .or_default()
                    .insert(fk.references.clone());
                adjacency
                    .entry(fk.references.clone())
                    .or_default()
                    .insert(table.id.clone());
                edges += 1;
            }
        }

        let mut by_name: HashMap<String, Vec<TableId>> = HashMap::new();
        for id in by_id.keys() {
            by_name.entry(id.name.clone()).or_default().push(id.clone());
        }

        tracing::debug!(
            database = %database,
            tables = by_id.len(),
            foreign_keys = edges,
            "built schema graph"
        );

        Ok(Self {
            database,
            tables: by_id,
            adjacency,
            by_name,
        })
    }

    /// Build a graph from a catalog snapshot
    pub fn from_snapshot(snapshot: SchemaSnapshot) -> Result<Self, SchemaError> {
        Self::build(snapshot.database, snapshot.tables)
    }

    /// Rebuild the snapshot this graph was built from (tables sorted)
    pub fn to_snapshot(&self) -> SchemaSnapshot {
        SchemaSnapshot::new(self.database.clone(), self.tables.values().cloned().collect())
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn table(&self, id: &TableId) -> Option<&Table> {
        self.tables.get(id)
    }

    pub fn contains(&self, id: &TableId) -> bool {
        self.tables.contains_key(id)
    }

    /// All tables in identifier order
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn table_ids(&self) -> impl Iterator<Item = &TableId> {
        self.tables.keys()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Tables one foreign-key hop away, in either direction
    pub fn neighbors(&self, id: &TableId) -> &BTreeSet<TableId> {
        self.adjacency.get(id).unwrap_or(&NO_NEIGHBORS)
    }

    /// Resolve a possibly unqualified table name
    ///
    /// Qualified names are looked up as written. An unqualified name resolves
    /// to `default_schema.name` when present, otherwise to the only table with
    /// that name in any schema.
    pub fn resolve(&self, schema: Option<&str>, name: &str, default_schema: &str) -> Option<&TableId> {
        if let Some(schema) = schema {
            let id = TableId::new(schema, name);
            return self.tables.get_key_value(&id).map(|(k, _)| k);
        }

        let candidates = self.by_name.get(name)?;
        candidates
            .iter()
            .find(|id| id.schema == default_schema)
            .or_else(|| match candidates.as_slice() {
                [only] => Some(only),
                _ => None,
            })
    }
}

/// Shared reference to the current schema graph
///
/// Readers call [`load`](Self::load) once per request and work against that
/// snapshot. A refresh installs a complete new graph with
/// [`replace`](Self::replace).
#[derive(Debug)]
pub struct SchemaHandle {
    current: RwLock<Arc<SchemaGraph>>,
}

impl SchemaHandle {
    pub fn new(graph: SchemaGraph) -> Self {
        Self {
            current: RwLock::new(Arc::new(graph)),
        }
    }

    /// Current graph
    pub fn load(&self) -> Arc<SchemaGraph> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Swap in a new graph, returning the previous one
    pub fn replace(&self, graph: SchemaGraph) -> Arc<SchemaGraph> {
        let next = Arc::new(graph);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }
}
