//! Shared schema for generation pipeline tests

#![allow(dead_code)]

use nl2sql_core::{Column, ForeignKey, Policy, SchemaGraph, Table, TableId};
use nl2sql_llm::Generation;

pub fn shop_graph() -> SchemaGraph {
    SchemaGraph::build(
        "shop",
        vec![
            Table::new(TableId::new("public", "customers"))
                .with_description("People who place orders")
                .with_column(Column::new("id", "integer").with_nullable(false))
                .with_column(Column::new("email", "text"))
                .with_column(Column::new("country", "text"))
                .with_primary_key(&["id"]),
            Table::new(TableId::new("public", "orders"))
                .with_column(Column::new("id", "integer").with_nullable(false))
                .with_column(Column::new("customer_id", "integer"))
                .with_column(Column::new("status", "text"))
                .with_column(Column::new("created_at", "timestamptz"))
                .with_primary_key(&["id"])
                .with_foreign_key(ForeignKey::new(
                    vec!["customer_id".into()],
                    TableId::new("public", "customers"),
                    vec!["id".into()],
                )),
            Table::new(TableId::new("public", "secret_table"))
                .with_column(Column::new("token", "text")),
        ],
    )
    .unwrap()
}

/// Every table allowed except `public.secret_table`
pub fn shop_policy(graph: &SchemaGraph) -> Policy {
    let allowed: Vec<TableId> = graph
        .table_ids()
        .filter(|id| id.name != "secret_table")
        .cloned()
        .collect();
    Policy::for_graph(graph).restricted_to(allowed.iter())
}

pub fn generation(sql: &str, tables: &[&str]) -> Generation {
    Generation {
        sql: sql.to_string(),
        assumptions: Vec::new(),
        tables_used: tables.iter().map(|t| t.to_string()).collect(),
        confidence: 0.7,
    }
}
