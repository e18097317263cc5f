//! SQL parsing and read-only validation
//!
//! This crate handles:
//! - Parsing PostgreSQL using datafusion-sqlparser-rs
//! - Lowering the parse into a small read-only query AST
//! - Deterministic re-serialization of that AST
//! - Guardrail checks against a schema graph and policy, with LIMIT injection

pub mod ast;
pub mod parser;
pub mod render;
pub mod guardrail;

pub use ast::{
    normalize_ident, Clause, ColumnRef, Cte, CteBinding, Distinct, FromItem, Join, JoinCondition,
    JoinKind, Select, SelectItem, SetOperation, SetOperator, Statement, Subquery, TableRef,
    TableSource,
};
pub use parser::{SqlParser, SyntaxError};
pub use guardrail::{is_side_effect_function, Accepted, Guardrail, Rejected, ValidationResult};
