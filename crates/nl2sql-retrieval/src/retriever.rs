//! Table scoring and foreign-key expansion
//!
//! Scoring rules, per allowlisted table:
//! - +3 when a question token equals the table's unqualified name
//! - +2 per column whose name equals a question token
//!
//! Names compare case-insensitively, so quoted mixed-case names still match.
//! - +1 per distinct question token found in each description field
//!   (table description and every column description count separately)
//!
//! Tables scoring above zero are ranked by score, then qualified name, and
//! capped at `policy.max_tables`. Each kept table then pulls in its one-hop
//! foreign-key neighbours with score 0; the whole result is capped again.

use crate::tokenize::tokenize;
use nl2sql_core::{Policy, SchemaGraph, Table, TableId};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Why a table was retrieved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Reason {
    /// Lexical hit on the table itself
    DirectMatch {
        /// Matched unqualified table name, if the name matched
        table: Option<String>,

        /// Matched column names, in column order
        columns: Vec<String>,

        /// Question tokens found in description fields
        description_tokens: Vec<String>,
    },

    /// Neighbour of an already retrieved table
    FkExpansion { from: TableId },
}

impl Reason {
    /// Stable reason code
    pub fn code(&self) -> &'static str {
        match self {
            Reason::DirectMatch { .. } => "direct_match",
            Reason::FkExpansion { .. } => "fk_expansion",
        }
    }

    /// Human-readable assumption for the prompt and the review screen
    pub fn describe(&self, table: &TableId) -> String {
        match self {
            Reason::DirectMatch {
                table: name,
                columns,
                description_tokens,
            } => {
                let mut parts = Vec::new();
                if let Some(name) = name {
                    parts.push(format!("table name '{}'", name));
                }
                if !columns.is_empty() {
                    parts.push(format!("columns {}", columns.join(", ")));
                }
                if !description_tokens.is_empty() {
                    parts.push(format!("description words {}", description_tokens.join(", ")));
                }
                format!("Using {} because the question matches {}", table, parts.join("; "))
            }
            Reason::FkExpansion { from } => {
                format!("Including {} because it is joined to {} by a foreign key", table, from)
            }
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::DirectMatch {
                table,
                columns,
                description_tokens,
            } => {
                write!(f, "direct_match(")?;
                let mut fields = Vec::new();
                if let Some(table) = table {
                    fields.push(format!("table={}", table));
                }
                if !columns.is_empty() {
                    fields.push(format!("columns={}", columns.join(",")));
                }
                if !description_tokens.is_empty() {
                    fields.push(format!("description={}", description_tokens.join(",")));
                }
                write!(f, "{})", fields.join("; "))
            }
            Reason::FkExpansion { from } => write!(f, "fk_expansion(from={})", from),
        }
    }
}

/// One ranked table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievedTable {
    pub id: TableId,
    pub score: u32,
    pub reasons: Vec<Reason>,
}

impl RetrievedTable {
    pub fn expanded_by_fk(&self) -> bool {
        self.reasons
            .iter()
            .all(|reason| matches!(reason, Reason::FkExpansion { .. }))
    }
}

/// Ranked retrieval result; order is rank order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievalResult {
    pub question: String,
    pub tables: Vec<RetrievedTable>,
}

impl RetrievalResult {
    pub fn table_ids(&self) -> impl Iterator<Item = &TableId> {
        self.tables.iter().map(|t| &t.id)
    }

    pub fn contains(&self, id: &TableId) -> bool {
        self.tables.iter().any(|t| &t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// One assumption line per reason, in rank order
    pub fn assumptions(&self) -> Vec<String> {
        self.tables
            .iter()
            .flat_map(|t| t.reasons.iter().map(move |r| r.describe(&t.id)))
            .collect()
    }
}

/// Rank the tables relevant to `question`
pub fn retrieve(question: &str, graph: &SchemaGraph, policy: &Policy) -> RetrievalResult {
    let tokens = tokenize(question);
    if tokens.is_empty() {
        tracing::debug!("question has no searchable tokens");
        return RetrievalResult {
            question: question.to_string(),
            tables: Vec::new(),
        };
    }

    let mut scored: Vec<RetrievedTable> = graph
        .tables()
        .filter(|table| policy.allows(&table.id))
        .filter_map(|table| score_table(table, &tokens))
        .collect();

    scored.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    scored.truncate(policy.max_tables);

    for table in &scored {
        tracing::debug!(table = %table.id, score = table.score, "direct match");
    }

    // First seed to reach a neighbour wins; seeds are walked in rank order
    let mut seen: HashSet<TableId> = scored.iter().map(|t| t.id.clone()).collect();
    let mut expanded: Vec<RetrievedTable> = Vec::new();
    for seed in &scored {
        for neighbor in graph.neighbors(&seed.id) {
            if !policy.allows(neighbor) || !seen.insert(neighbor.clone()) {
                continue;
            }
            tracing::debug!(table = %neighbor, from = %seed.id, "foreign-key expansion");
            expanded.push(RetrievedTable {
                id: neighbor.clone(),
                score: 0,
                reasons: vec![Reason::FkExpansion {
                    from: seed.id.clone(),
                }],
            });
        }
    }

    expanded.sort_by(|a, b| a.id.cmp(&b.id));

    let mut tables = scored;
    tables.extend(expanded);
    tables.truncate(policy.max_tables);

    RetrievalResult {
        question: question.to_string(),
        tables,
    }
}

fn score_table(table: &Table, tokens: &BTreeSet<String>) -> Option<RetrievedTable> {
    let mut score = 0u32;

    let name_hit = tokens.contains(&table.id.name.to_lowercase());
    if name_hit {
        score += 3;
    }

    let columns: Vec<String> = table
        .columns
        .iter()
        .filter(|c| tokens.contains(&c.name.to_lowercase()))
        .map(|c| c.name.clone())
        .collect();
    score += 2 * columns.len() as u32;

    let mut description_tokens = BTreeSet::new();
    let descriptions = table
        .description
        .iter()
        .chain(table.columns.iter().filter_map(|c| c.description.as_ref()));
    for description in descriptions {
        let hits: Vec<String> = tokenize(description).intersection(tokens).cloned().collect();
        score += hits.len() as u32;
        description_tokens.extend(hits);
    }

    if score == 0 {
        return None;
    }

    Some(RetrievedTable {
        id: table.id.clone(),
        score,
        reasons: vec![Reason::DirectMatch {
            table: name_hit.then(|| table.id.name.clone()),
            columns,
            description_tokens: description_tokens.into_iter().collect(),
        }],
    })
}
