//! Test fixtures for catalog integration tests
//!
//! A small shop schema with a composite foreign key and a view, as it would
//! come back from `information_schema`.

#![allow(dead_code)]

use nl2sql_catalog::{MockSource, MockSourceBuilder};
use nl2sql_core::{Column, ForeignKey, Table, TableId, TableKind};

pub fn customers() -> Table {
    Table::new(TableId::new("public", "customers"))
        .with_description("People who place orders")
        .with_column(Column::new("id", "integer").with_nullable(false))
        .with_column(Column::new("email", "text").with_nullable(false))
        .with_column(Column::new("country", "text"))
        .with_primary_key(&["id"])
}

pub fn orders() -> Table {
    Table::new(TableId::new("public", "orders"))
        .with_column(Column::new("id", "integer").with_nullable(false))
        .with_column(Column::new("customer_id", "integer").with_nullable(false))
        .with_column(Column::new("status", "text").with_description("Fulfilment status"))
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

pub fn order_lines() -> Table {
    Table::new(TableId::new("public", "order_lines"))
        .with_column(Column::new("order_id", "integer").with_nullable(false))
        .with_column(Column::new("line_no", "integer").with_nullable(false))
        .with_column(Column::new("amount", "numeric"))
        .with_primary_key(&["order_id", "line_no"])
        .with_foreign_key(ForeignKey::new(
            vec!["order_id".into()],
            TableId::new("public", "orders"),
            vec!["id".into()],
        ))
}

pub fn shipments() -> Table {
    Table::new(TableId::new("public", "shipments"))
        .with_column(Column::new("id", "integer").with_nullable(false))
        .with_column(Column::new("order_id", "integer"))
        .with_column(Column::new("line_no", "integer"))
        .with_foreign_key(
            ForeignKey::new(
                vec!["order_id".into(), "line_no".into()],
                TableId::new("public", "order_lines"),
                vec!["order_id".into(), "line_no".into()],
            )
            .with_name("shipments_line_fkey"),
        )
}

pub fn revenue_view() -> Table {
    Table::new(TableId::new("reporting", "daily_revenue"))
        .with_kind(TableKind::View)
        .with_column(Column::new("day", "date"))
        .with_column(Column::new("revenue", "numeric"))
}

/// Table whose foreign key points outside the `public` schema
pub fn audit_events() -> Table {
    Table::new(TableId::new("public", "audit_events"))
        .with_column(Column::new("id", "integer"))
        .with_column(Column::new("actor_id", "integer"))
        .with_foreign_key(ForeignKey::new(
            vec!["actor_id".into()],
            TableId::new("auth", "users"),
            vec!["id".into()],
        ))
}

pub fn shop_source() -> MockSource {
    MockSourceBuilder::new("shop")
        .with_table(customers())
        .with_table(orders())
        .with_table(order_lines())
        .with_table(shipments())
        .with_table(revenue_view())
        .build()
}

pub fn schemas(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
