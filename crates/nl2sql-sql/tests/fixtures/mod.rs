//! Test fixtures for parser and guardrail integration tests
//!
//! A small e-commerce schema with one table that is never allowlisted.

use nl2sql_core::{Column, ForeignKey, Policy, SchemaGraph, Table, TableId};

/// Customers, referenced by orders
pub fn customers_table() -> Table {
    Table::new(TableId::new("public", "customers"))
        .with_description("Registered shop customers")
        .with_column(Column::new("id", "integer").with_nullable(false))
        .with_column(Column::new("name", "text"))
        .with_column(Column::new("email", "text"))
        .with_primary_key(&["id"])
}

/// Orders with status tracking
pub fn orders_table() -> Table {
    Table::new(TableId::new("public", "orders"))
        .with_description("Customer orders")
        .with_column(Column::new("id", "integer").with_nullable(false))
        .with_column(Column::new("customer_id", "integer").with_nullable(false))
        .with_column(Column::new("status", "text").with_description("Order status such as open or shipped"))
        .with_column(Column::new("created_at", "timestamp with time zone"))
        .with_primary_key(&["id"])
        .with_foreign_key(
            ForeignKey::new(
                vec!["customer_id".into()],
                TableId::new("public", "customers"),
                vec!["id".into()],
            )
            .with_name("orders_customer_id_fkey"),
        )
}

/// Table that exists in the schema but is outside every allowlist
pub fn secret_table() -> Table {
    Table::new(TableId::new("public", "secret_table"))
        .with_column(Column::new("id", "integer"))
        .with_column(Column::new("payload", "text"))
}

pub fn shop_graph() -> SchemaGraph {
    SchemaGraph::build("shop", vec![customers_table(), orders_table(), secret_table()])
        .expect("fixture graph is valid")
}

/// Everything except `public.secret_table`
pub fn shop_policy(graph: &SchemaGraph) -> Policy {
    let allowed = [
        TableId::new("public", "orders"),
        TableId::new("public", "customers"),
    ];
    Policy::for_graph(graph).restricted_to(allowed.iter())
}
