//! Retrieval and guardrail policy

use crate::config::{Config, DEFAULT_FORBIDDEN_KEYWORDS};
use crate::graph::SchemaGraph;
use crate::schema::TableId;
use std::collections::BTreeSet;

/// Limits and allowlist applied to one retrieval or validation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    /// Tables that may be retrieved or referenced
    pub allowlist: BTreeSet<TableId>,

    /// Upper bound on tables returned by retrieval
    pub max_tables: usize,

    /// LIMIT injected into unbounded non-aggregate selects
    pub default_limit: u64,

    /// Keywords reported as forbidden root statements
    pub forbidden_keywords: Vec<String>,

    /// Schema used to resolve unqualified table names
    pub default_schema: String,
}

impl Policy {
    /// Allow every table in the graph with default limits
    pub fn for_graph(graph: &SchemaGraph) -> Self {
        Self {
            allowlist: graph.table_ids().cloned().collect(),
            max_tables: 6,
            default_limit: 100,
            forbidden_keywords: DEFAULT_FORBIDDEN_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            default_schema: "public".to_string(),
        }
    }

    /// Expand configured allow/deny patterns over the tables in `graph`
    pub fn from_config(config: &Config, graph: &SchemaGraph) -> Self {
        let rules = &config.guardrail.tables;
        let allowlist: BTreeSet<TableId> = graph
            .table_ids()
            .filter(|id| rules.is_allowed(&id.qualified()))
            .cloned()
            .collect();

        tracing::debug!(
            allowed = allowlist.len(),
            total = graph.len(),
            "expanded table allowlist"
        );

        Self {
            allowlist,
            max_tables: config.retrieval.max_tables,
            default_limit: config.guardrail.default_limit,
            forbidden_keywords: config.guardrail.forbidden_keywords.clone(),
            default_schema: config.default_schema.clone(),
        }
    }

    pub fn allows(&self, table: &TableId) -> bool {
        self.allowlist.contains(table)
    }

    /// Same limits, allowlist narrowed to `tables`
    pub fn restricted_to<'a, I>(&self, tables: I) -> Self
    where
        I: IntoIterator<Item = &'a TableId>,
    {
        let allowlist = tables
            .into_iter()
            .filter(|id| self.allowlist.contains(*id))
            .cloned()
            .collect();

        Self {
            allowlist,
            ..self.clone()
        }
    }

    pub fn with_max_tables(mut self, max_tables: usize) -> Self {
        self.max_tables = max_tables;
        self
    }

    pub fn with_default_limit(mut self, default_limit: u64) -> Self {
        self.default_limit = default_limit;
        self
    }

    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    /// Whether `keyword` is in the configured forbidden list
    pub fn is_forbidden_keyword(&self, keyword: &str) -> bool {
        self.forbidden_keywords
            .iter()
            .any(|k| k.eq_ignore_ascii_case(keyword))
    }
}
