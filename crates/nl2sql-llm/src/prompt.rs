//! Prompt construction from a retrieval result
//!
//! The generator only ever sees the retrieved tables. The schema subset and
//! the response contract are rendered as JSON with sorted keys so the same
//! question against the same cache always yields the same prompt.

use nl2sql_core::{Policy, SchemaGraph, Table, TableId};
use nl2sql_retrieval::RetrievalResult;
use serde::Serialize;
use serde_json::{json, Map, Value};

pub const SYSTEM_PROMPT: &str = "You are a PostgreSQL SQL generation assistant. \
Output JSON only and follow the response contract exactly. \
Generate one safe SELECT query for human review.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("Question is empty")]
    EmptyQuestion,

    #[error("No relevant tables found for the question; refresh the schema cache or rephrase")]
    NoTables,
}

/// Everything sent to a generator for one question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptBundle {
    pub question: String,

    /// Retrieved tables in rank order
    #[serde(skip)]
    pub tables: Vec<Table>,

    pub schema_subset: Value,

    pub contract: Value,

    pub system_prompt: String,

    pub user_prompt: String,

    /// Retrieval reasons, one line each
    pub assumptions: Vec<String>,

    /// LIMIT the generator is asked to use for non-aggregate queries
    pub default_limit: u64,
}

impl PromptBundle {
    pub fn table_ids(&self) -> impl Iterator<Item = &TableId> {
        self.tables.iter().map(|t| &t.id)
    }
}

/// JSON contract every generation must satisfy
pub fn response_contract() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["sql", "assumptions", "tables_used", "confidence"],
        "properties": {
            "sql": { "type": "string", "minLength": 1 },
            "assumptions": { "type": "array", "items": { "type": "string" } },
            "tables_used": { "type": "array", "items": { "type": "string" } },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
        }
    })
}

/// `{database, schemas: {schema: {tables: {name: {...}}}}}` for `tables`
pub fn schema_subset(database: &str, tables: &[Table]) -> Value {
    let mut schemas = Map::new();

    for table in tables {
        let columns: Map<String, Value> = table
            .columns
            .iter()
            .map(|c| {
                (
                    c.name.clone(),
                    json!({
                        "type": c.data_type,
                        "nullable": c.nullable,
                        "description": c.description,
                    }),
                )
            })
            .collect();

        let foreign_keys: Vec<Value> = table
            .foreign_keys
            .iter()
            .map(|fk| {
                json!({
                    "name": fk.name,
                    "columns": fk.columns,
                    "references": {
                        "schema": fk.references.schema,
                        "table": fk.references.name,
                        "columns": fk.referenced_columns,
                    },
                })
            })
            .collect();

        let entry = json!({
            "type": table.kind,
            "description": table.description,
            "columns": columns,
            "primary_key": table.primary_key,
            "foreign_keys": foreign_keys,
        });

        let schema = schemas
            .entry(table.id.schema.clone())
            .or_insert_with(|| json!({ "tables": {} }));
        if let Some(map) = schema.get_mut("tables").and_then(Value::as_object_mut) {
            map.insert(table.id.name.clone(), entry);
        }
    }

    json!({ "database": database, "schemas": schemas })
}

/// Build the prompt for `question` from its retrieval result
pub fn build_prompt(
    question: &str,
    retrieval: &RetrievalResult,
    graph: &SchemaGraph,
    policy: &Policy,
) -> Result<PromptBundle, PromptError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(PromptError::EmptyQuestion);
    }

    let tables: Vec<Table> = retrieval
        .table_ids()
        .filter_map(|id| graph.table(id).cloned())
        .collect();
    if tables.is_empty() {
        return Err(PromptError::NoTables);
    }

    let schema_subset = schema_subset(graph.database(), &tables);
    let contract = response_contract();
    let relevant: Vec<String> = tables.iter().map(|t| t.id.to_string()).collect();

    let user_prompt = format!(
        "Task:\n\
         Write one PostgreSQL SELECT query that answers the question.\n\
         \n\
         Constraints:\n\
         - Use only the tables and columns listed in the schema subset.\n\
         - SELECT statements only; never modify data or schema.\n\
         - Name columns explicitly and alias every table; avoid SELECT *.\n\
         - Add LIMIT {limit} to queries that do not aggregate.\n\
         \n\
         Question:\n\
         {question}\n\
         \n\
         Relevant tables:\n\
         {relevant}\n\
         \n\
         Schema subset:\n\
         {subset}\n\
         \n\
         Response contract:\n\
         {contract}\n\
         \n\
         Return only a JSON object matching the contract.",
        limit = policy.default_limit,
        question = question,
        relevant = serde_json::to_string(&relevant).unwrap_or_default(),
        subset = serde_json::to_string_pretty(&schema_subset).unwrap_or_default(),
        contract = serde_json::to_string_pretty(&contract).unwrap_or_default(),
    );

    tracing::debug!(tables = tables.len(), chars = user_prompt.len(), "built prompt");

    Ok(PromptBundle {
        question: question.to_string(),
        tables,
        schema_subset,
        contract,
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt,
        assumptions: retrieval.assumptions(),
        default_limit: policy.default_limit,
    })
}
