//! Read-only guardrail for generated SQL
//!
//! Walks a parsed [`Statement`] against the active [`SchemaGraph`] and a
//! [`Policy`]. Findings accumulate per rule; the statement is accepted only
//! when no rule reports an error, in which case an unbounded non-aggregate
//! select gets the policy's default `LIMIT`.
//!
//! A select is only as read-only as the functions it calls: calls with side
//! effects (sequence updates, backend signals, remote or file access, sleeps)
//! are rejected like mutating statements.

use crate::ast::{
    normalize_written, ColumnRef, FromItem, JoinCondition, Select, SelectItem, Statement, TableRef,
    TableSource,
};
use crate::parser::SqlParser;
use nl2sql_core::config::glob_match;
use nl2sql_core::{Diagnostic, ErrorKind, Policy, SchemaGraph, TableId};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Function name patterns (`*` wildcards) a read-only query may not call
const SIDE_EFFECT_FUNCTIONS: &[&str] = &[
    "setval",
    "nextval",
    "set_config",
    "pg_terminate_backend",
    "pg_cancel_backend",
    "pg_reload_conf",
    "pg_rotate_logfile",
    "pg_notify",
    "pg_advisory_*",
    "pg_sleep*",
    "pg_read_*file",
    "pg_ls_*",
    "dblink*",
    "lo_*",
];

/// Whether `function` (lower-cased, unqualified) has side effects
pub fn is_side_effect_function(function: &str) -> bool {
    SIDE_EFFECT_FUNCTIONS
        .iter()
        .any(|pattern| glob_match(pattern, function))
}

/// Outcome of validating one statement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ValidationResult {
    Accepted(Accepted),
    Rejected(Rejected),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accepted {
    /// Statement as it should be shown, including any injected LIMIT
    pub sql: String,

    pub warnings: Vec<Diagnostic>,

    /// Schema tables referenced anywhere in the statement
    pub tables_used: Vec<TableId>,

    /// `schema.table.column` for every verified column reference
    pub columns_used: Vec<String>,

    pub limit_added: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejected {
    /// Blocking findings, in rule order
    pub errors: Vec<Diagnostic>,

    pub warnings: Vec<Diagnostic>,
}

impl ValidationResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationResult::Accepted(_))
    }

    /// Blocking findings (empty when accepted)
    pub fn errors(&self) -> &[Diagnostic] {
        match self {
            ValidationResult::Accepted(_) => &[],
            ValidationResult::Rejected(rejected) => &rejected.errors,
        }
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        match self {
            ValidationResult::Accepted(accepted) => &accepted.warnings,
            ValidationResult::Rejected(rejected) => &rejected.warnings,
        }
    }

    /// Safe SQL, only available when accepted
    pub fn sql(&self) -> Option<&str> {
        match self {
            ValidationResult::Accepted(accepted) => Some(&accepted.sql),
            ValidationResult::Rejected(_) => None,
        }
    }
}

/// Validator bound to one schema graph
#[derive(Debug, Clone, Copy)]
pub struct Guardrail<'g> {
    graph: &'g SchemaGraph,
}

impl<'g> Guardrail<'g> {
    pub fn new(graph: &'g SchemaGraph) -> Self {
        Self { graph }
    }

    /// Parse and validate SQL text
    pub fn validate_sql(&self, sql: &str, policy: &Policy) -> ValidationResult {
        match SqlParser::postgres().parse(sql) {
            Ok(statement) => self.validate(&statement, policy),
            Err(e) => {
                tracing::debug!(error = %e, "rejecting unparseable SQL");
                ValidationResult::Rejected(Rejected {
                    errors: vec![e.to_diagnostic()],
                    warnings: Vec::new(),
                })
            }
        }
    }

    /// Validate a parsed statement
    pub fn validate(&self, statement: &Statement, policy: &Policy) -> ValidationResult {
        let mut walker = Walker::new(self.graph, policy);
        walker.walk_statement(statement);

        let Walker {
            forbidden,
            tables,
            columns,
            warnings,
            tables_used,
            columns_used,
            ..
        } = walker;

        let errors = dedup(forbidden.into_iter().chain(tables).chain(columns));
        let warnings = dedup(warnings);

        if !errors.is_empty() {
            tracing::debug!(errors = errors.len(), "statement rejected");
            return ValidationResult::Rejected(Rejected { errors, warnings });
        }

        let needs_limit = statement
            .top_level_select()
            .map(|select| select.limit.is_none() && !select.is_aggregate_query())
            .unwrap_or(false);

        let sql = if needs_limit {
            tracing::debug!(limit = policy.default_limit, "injecting default LIMIT");
            statement.with_limit(policy.default_limit).to_string()
        } else {
            statement.to_string()
        };

        ValidationResult::Accepted(Accepted {
            sql,
            warnings,
            tables_used: tables_used.into_iter().collect(),
            columns_used: columns_used.into_iter().collect(),
            limit_added: needs_limit,
        })
    }
}

fn dedup(findings: impl IntoIterator<Item = Diagnostic>) -> Vec<Diagnostic> {
    let mut seen = HashSet::new();
    findings
        .into_iter()
        .filter(|d| seen.insert(d.clone()))
        .collect()
}

/// What a FROM entry resolves to
#[derive(Debug, Clone)]
enum SourceKind {
    Table(TableId),
    /// CTE, derived table or rejected table; its columns are not checked
    Opaque,
}

#[derive(Debug, Clone)]
struct Source {
    alias: Option<String>,
    /// Unqualified and fully written names of an unaliased table
    names: Vec<String>,
    kind: SourceKind,
}

impl Source {
    fn answers_to(&self, qualifier: &str) -> bool {
        match &self.alias {
            Some(alias) => alias == qualifier,
            None => self.names.iter().any(|n| n == qualifier),
        }
    }
}

struct Walker<'a> {
    graph: &'a SchemaGraph,
    policy: &'a Policy,

    /// One entry per enclosing select, innermost last
    scopes: Vec<Vec<Source>>,

    /// CTE names in scope
    ctes: Vec<String>,

    forbidden: Vec<Diagnostic>,
    tables: Vec<Diagnostic>,
    columns: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,

    tables_used: BTreeSet<TableId>,
    columns_used: BTreeSet<String>,
}

impl<'a> Walker<'a> {
    fn new(graph: &'a SchemaGraph, policy: &'a Policy) -> Self {
        Self {
            graph,
            policy,
            scopes: Vec::new(),
            ctes: Vec::new(),
            forbidden: Vec::new(),
            tables: Vec::new(),
            columns: Vec::new(),
            warnings: Vec::new(),
            tables_used: BTreeSet::new(),
            columns_used: BTreeSet::new(),
        }
    }

    fn walk_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Select(select) => self.walk_select(select),
            Statement::SetOperation(op) => {
                self.walk_statement(&op.left);
                self.walk_statement(&op.right);
                self.check_functions(&op.functions);
                for subquery in &op.subqueries {
                    self.walk_statement(&subquery.statement);
                }
            }
            Statement::Cte(cte) => {
                let mark = self.ctes.len();
                if cte.recursive {
                    self.ctes.extend(cte.names().map(str::to_string));
                }
                for binding in &cte.bindings {
                    self.walk_statement(&binding.query);
                    if !cte.recursive {
                        self.ctes.push(binding.name.clone());
                    }
                }
                self.walk_statement(&cte.body);
                self.ctes.truncate(mark);
            }
            Statement::Forbidden { keyword } => self.forbid(keyword),
        }
    }

    fn forbid(&mut self, keyword: &str) {
        let verb = keyword.split_whitespace().next().unwrap_or(keyword);
        let message = if self.policy.is_forbidden_keyword(verb) {
            format!("{} statements are not allowed; only read-only SELECT queries are accepted", keyword)
        } else {
            format!("{} is not a read-only query", keyword)
        };

        tracing::debug!(%keyword, "forbidden statement");
        self.forbidden
            .push(Diagnostic::error(ErrorKind::ForbiddenStatement, keyword, message));
    }

    fn check_functions(&mut self, functions: &[String]) {
        for function in functions {
            if is_side_effect_function(function) {
                tracing::debug!(%function, "side-effecting function call");
                self.forbidden.push(Diagnostic::error(
                    ErrorKind::ForbiddenStatement,
                    function.as_str(),
                    format!(
                        "Function {} has side effects; only read-only SELECT queries are accepted",
                        function
                    ),
                ));
            }
        }
    }

    fn walk_select(&mut self, select: &Select) {
        self.scopes.push(Vec::new());

        for item in &select.from {
            self.walk_from_item(item);
        }
        self.check_functions(&select.functions);

        for item in &select.items {
            match item {
                SelectItem::Wildcard => self.warn_wildcard("*"),
                SelectItem::QualifiedWildcard { qualifier, .. } => {
                    self.warn_wildcard(&format!("{}.*", qualifier));
                    if self.find_source(qualifier).is_none() {
                        self.unknown_column(format!("{}.*", qualifier));
                    }
                }
                _ => {}
            }
        }

        let aliases = select.output_aliases();
        for reference in &select.references {
            self.check_column(reference, &aliases);
        }

        for subquery in &select.subqueries {
            self.walk_statement(&subquery.statement);
        }

        self.scopes.pop();
    }

    /// Resolve the sources of one FROM entry into the current scope
    fn walk_from_item(&mut self, item: &FromItem) {
        let first = self.source(&item.source);
        let mut joined = vec![first.clone()];
        self.push_source(first);

        for join in &item.joins {
            let source = self.source(&join.source);
            if let JoinCondition::Using(columns) = &join.condition {
                for written in columns {
                    self.check_using_column(&normalize_written(written), &joined, &source);
                }
            }
            joined.push(source.clone());
            self.push_source(source);
        }
    }

    fn push_source(&mut self, source: Source) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(source);
        }
    }

    fn source(&mut self, source: &TableSource) -> Source {
        match source {
            TableSource::Table(table) => self.table_source(table),
            TableSource::Derived { lateral, query, alias } => {
                if *lateral {
                    self.walk_statement(query);
                } else {
                    // Siblings are not visible to a plain derived table
                    let current = self.scopes.pop().unwrap_or_default();
                    self.walk_statement(query);
                    self.scopes.push(current);
                }
                Source {
                    alias: alias.as_ref().map(|a| crate::ast::normalize_ident(&a.name)),
                    names: Vec::new(),
                    kind: SourceKind::Opaque,
                }
            }
        }
    }

    /// `USING (column)` needs the column on the joined source and on at
    /// least one source to its left; opaque sources are taken on trust
    fn check_using_column(&mut self, column: &str, left: &[Source], right: &Source) {
        self.check_kind_column(&right.kind, column);

        let mut nearest_table = None;
        for source in left.iter().rev() {
            match &source.kind {
                SourceKind::Opaque => return,
                SourceKind::Table(id) => {
                    if self.table_has_column(id, column) {
                        self.columns_used.insert(format!("{}.{}", id, column));
                        return;
                    }
                    nearest_table.get_or_insert_with(|| id.clone());
                }
            }
        }

        if let Some(id) = nearest_table {
            self.unknown_column(format!("{}.{}", id, column));
        }
    }

    fn check_kind_column(&mut self, kind: &SourceKind, column: &str) {
        let SourceKind::Table(id) = kind else {
            return;
        };
        if self.table_has_column(id, column) {
            self.columns_used.insert(format!("{}.{}", id, column));
        } else {
            self.unknown_column(format!("{}.{}", id, column));
        }
    }

    fn table_has_column(&self, id: &TableId, column: &str) -> bool {
        self.graph
            .table(id)
            .map(|table| table.has_column(column))
            .unwrap_or(false)
    }

    fn table_source(&mut self, table: &TableRef) -> Source {
        let names = vec![table.table_name().to_string(), table.qualified_name()];
        let kind = self.resolve_table(table);
        Source {
            alias: table.alias_name(),
            names,
            kind,
        }
    }

    fn resolve_table(&mut self, table: &TableRef) -> SourceKind {
        if let [name] = table.parts.as_slice() {
            if self.ctes.iter().any(|cte| cte == name) {
                return SourceKind::Opaque;
            }
        }

        let (schema, name) = match table.parts.as_slice() {
            [name] => (None, name.as_str()),
            [schema, name] => (Some(schema.as_str()), name.as_str()),
            [database, schema, name] if database.eq_ignore_ascii_case(self.graph.database()) => {
                (Some(schema.as_str()), name.as_str())
            }
            _ => {
                self.unknown_table(table.qualified_name());
                return SourceKind::Opaque;
            }
        };

        match self.graph.resolve(schema, name, &self.policy.default_schema) {
            Some(id) if self.policy.allows(id) => {
                self.tables_used.insert(id.clone());
                SourceKind::Table(id.clone())
            }
            Some(id) => {
                let detail = id.qualified();
                self.unknown_table(detail);
                SourceKind::Opaque
            }
            None => {
                let schema = schema.unwrap_or(&self.policy.default_schema);
                self.unknown_table(format!("{}.{}", schema, name));
                SourceKind::Opaque
            }
        }
    }

    fn unknown_table(&mut self, detail: String) {
        tracing::debug!(table = %detail, "table outside allowlist");
        let message = format!("Table {} is not in the allowed schema", detail);
        self.tables
            .push(Diagnostic::error(ErrorKind::UnknownTable, detail, message));
    }

    fn unknown_column(&mut self, detail: String) {
        tracing::debug!(column = %detail, "unknown column");
        let message = format!("Column {} does not exist", detail);
        self.columns
            .push(Diagnostic::error(ErrorKind::UnknownColumn, detail, message));
    }

    fn warn_wildcard(&mut self, projection: &str) {
        self.warnings.push(Diagnostic::warning(
            ErrorKind::WildcardProjection,
            projection,
            format!("Projection {} selects every column; list the columns you need", projection),
        ));
    }

    /// Innermost source answering to `qualifier`
    fn find_source(&self, qualifier: &str) -> Option<&Source> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.iter().rev().find(|s| s.answers_to(qualifier)))
    }

    fn check_column(&mut self, reference: &ColumnRef, aliases: &[String]) {
        let column = reference.column.as_str();

        let kind = match &reference.qualifier {
            Some(qualifier) => match self.find_source(qualifier) {
                Some(source) => source.kind.clone(),
                None => {
                    self.unknown_column(format!("{}.{}", qualifier, column));
                    return;
                }
            },
            None => {
                if reference.clause.sees_output_aliases() && aliases.iter().any(|a| a == column) {
                    return;
                }

                let Some(scope) = self.scopes.iter().rev().find(|s| !s.is_empty()) else {
                    self.unknown_column(column.to_string());
                    return;
                };

                match scope.as_slice() {
                    [only] => only.kind.clone(),
                    _ => {
                        tracing::debug!(%column, "ambiguous column");
                        self.columns.push(Diagnostic::error(
                            ErrorKind::AmbiguousColumn,
                            column,
                            format!("Column {} could refer to more than one table; qualify it", column),
                        ));
                        return;
                    }
                }
            }
        };

        self.check_kind_column(&kind, column);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl2sql_core::{Column, ForeignKey, Table};
    use pretty_assertions::assert_eq;

    fn graph() -> SchemaGraph {
        SchemaGraph::build(
            "shop",
            vec![
                Table::new(TableId::new("public", "customers"))
                    .with_column(Column::new("id", "integer"))
                    .with_column(Column::new("name", "text"))
                    .with_column(Column::new("email", "text")),
                Table::new(TableId::new("public", "orders"))
                    .with_column(Column::new("id", "integer"))
                    .with_column(Column::new("customer_id", "integer"))
                    .with_column(Column::new("status", "text"))
                    .with_column(Column::new("created_at", "timestamptz"))
                    .with_foreign_key(ForeignKey::new(
                        vec!["customer_id".into()],
                        TableId::new("public", "customers"),
                        vec!["id".into()],
                    )),
                Table::new(TableId::new("public", "secret_table"))
                    .with_column(Column::new("id", "integer")),
            ],
        )
        .unwrap()
    }

    fn policy(graph: &SchemaGraph) -> Policy {
        let allowed = [TableId::new("public", "orders"), TableId::new("public", "customers")];
        Policy::for_graph(graph).restricted_to(allowed.iter())
    }

    fn check(sql: &str) -> ValidationResult {
        let graph = graph();
        let policy = policy(&graph);
        Guardrail::new(&graph).validate_sql(sql, &policy)
    }

    fn error_kinds(result: &ValidationResult) -> Vec<(ErrorKind, String)> {
        result
            .errors()
            .iter()
            .map(|d| (d.kind, d.detail.clone()))
            .collect()
    }

    #[test]
    fn aggregate_query_is_accepted_unchanged() {
        let result = check("SELECT status, COUNT(*) FROM public.orders GROUP BY status");
        match result {
            ValidationResult::Accepted(accepted) => {
                assert_eq!(accepted.sql, "SELECT status, COUNT(*) FROM public.orders GROUP BY status");
                assert!(!accepted.limit_added);
                assert_eq!(accepted.tables_used, vec![TableId::new("public", "orders")]);
                assert_eq!(accepted.columns_used, vec!["public.orders.status"]);
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn unbounded_select_gets_default_limit() {
        let result = check("SELECT o.id FROM public.orders o");
        assert_eq!(result.sql(), Some("SELECT o.id FROM public.orders o LIMIT 100"));
        assert!(matches!(result, ValidationResult::Accepted(ref a) if a.limit_added));
    }

    #[test]
    fn existing_limit_is_kept() {
        let result = check("SELECT id FROM orders ORDER BY id LIMIT 5");
        assert_eq!(result.sql(), Some("SELECT id FROM orders ORDER BY id LIMIT 5"));
    }

    #[test]
    fn delete_is_forbidden() {
        let result = check("DELETE FROM public.orders WHERE id = '1'");
        assert_eq!(
            error_kinds(&result),
            vec![(ErrorKind::ForbiddenStatement, "DELETE".to_string())]
        );
    }

    #[test]
    fn table_outside_allowlist_is_named() {
        let result = check("SELECT * FROM public.secret_table");
        assert_eq!(
            error_kinds(&result),
            vec![(ErrorKind::UnknownTable, "public.secret_table".to_string())]
        );
        assert_eq!(result.warnings()[0].kind, ErrorKind::WildcardProjection);
    }

    #[test]
    fn missing_table_defaults_to_default_schema() {
        let result = check("SELECT x FROM nowhere");
        assert_eq!(
            error_kinds(&result),
            vec![(ErrorKind::UnknownTable, "public.nowhere".to_string())]
        );
    }

    #[test]
    fn unknown_qualified_column() {
        let result = check("SELECT o.nope FROM public.orders o");
        assert_eq!(
            error_kinds(&result),
            vec![(ErrorKind::UnknownColumn, "public.orders.nope".to_string())]
        );
    }

    #[test]
    fn unknown_qualifier() {
        let result = check("SELECT x.id FROM orders o");
        assert_eq!(
            error_kinds(&result),
            vec![(ErrorKind::UnknownColumn, "x.id".to_string())]
        );
    }

    #[test]
    fn alias_hides_table_name() {
        let result = check("SELECT orders.id FROM orders o");
        assert_eq!(result.errors()[0].kind, ErrorKind::UnknownColumn);
    }

    #[test]
    fn unqualified_column_with_two_sources_is_ambiguous() {
        let result = check(
            "SELECT name FROM orders o JOIN customers c ON o.customer_id = c.id",
        );
        assert_eq!(
            error_kinds(&result),
            vec![(ErrorKind::AmbiguousColumn, "name".to_string())]
        );
    }

    #[test]
    fn output_aliases_in_order_by_and_group_by() {
        let result = check(
            "SELECT o.status AS state, COUNT(*) AS n FROM orders o GROUP BY state ORDER BY n DESC",
        );
        assert!(result.is_accepted(), "{:?}", result);
    }

    #[test]
    fn output_alias_not_visible_in_where() {
        let result = check("SELECT o.status AS state FROM orders o WHERE state = 'open'");
        assert!(!result.is_accepted());
    }

    #[test]
    fn join_with_three_part_name() {
        let result = check(
            "SELECT o.id, c.email FROM shop.public.orders o JOIN customers c ON o.customer_id = c.id",
        );
        match result {
            ValidationResult::Accepted(accepted) => {
                assert_eq!(accepted.tables_used.len(), 2);
                assert!(accepted.limit_added);
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn cte_names_are_not_tables() {
        let result = check(
            "WITH recent AS (SELECT id, status FROM orders WHERE created_at > now() - INTERVAL '7 days') \
             SELECT r.status FROM recent r",
        );
        let sql = result.sql().unwrap();
        assert!(sql.starts_with("WITH recent AS (SELECT id, status FROM orders WHERE"));
        assert!(sql.ends_with("SELECT r.status FROM recent r LIMIT 100"));
    }

    #[test]
    fn cte_bodies_are_checked() {
        let result = check("WITH s AS (SELECT id FROM secret_table) SELECT id FROM s");
        assert_eq!(
            error_kinds(&result),
            vec![(ErrorKind::UnknownTable, "public.secret_table".to_string())]
        );
    }

    #[test]
    fn correlated_subquery_sees_outer_scope() {
        let result = check(
            "SELECT c.name FROM customers c WHERE EXISTS (SELECT 1 FROM orders o WHERE o.customer_id = c.id)",
        );
        assert!(result.is_accepted(), "{:?}", result);
    }

    #[test]
    fn subquery_tables_are_checked() {
        let result = check("SELECT id FROM orders WHERE customer_id IN (SELECT id FROM secret_table)");
        assert_eq!(
            error_kinds(&result),
            vec![(ErrorKind::UnknownTable, "public.secret_table".to_string())]
        );
    }

    #[test]
    fn derived_table_columns_are_not_checked() {
        let result = check("SELECT t.anything FROM (SELECT id FROM orders) t");
        assert!(result.is_accepted(), "{:?}", result);
    }

    #[test]
    fn set_operations_are_exempt_from_limit() {
        let result = check("SELECT id FROM orders UNION SELECT id FROM customers");
        match result {
            ValidationResult::Accepted(accepted) => {
                assert_eq!(accepted.sql, "SELECT id FROM orders UNION SELECT id FROM customers");
                assert!(!accepted.limit_added);
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn nested_forbidden_statement() {
        let result = check(
            "WITH added AS (INSERT INTO orders (id) VALUES (1) RETURNING id) SELECT id FROM added",
        );
        assert_eq!(result.errors()[0].kind, ErrorKind::ForbiddenStatement);
        assert_eq!(result.errors()[0].detail, "INSERT");
    }

    #[test]
    fn duplicate_findings_are_removed() {
        let result = check("SELECT s.id FROM secret_table s JOIN secret_table t ON s.id = t.id");
        assert_eq!(result.errors().len(), 1);
    }

    #[test]
    fn narrowed_allowlist_rejects_other_tables() {
        let graph = graph();
        let only_orders = [TableId::new("public", "orders")];
        let policy = Policy::for_graph(&graph).restricted_to(only_orders.iter());

        let result = Guardrail::new(&graph).validate_sql(
            "SELECT o.id FROM orders o JOIN customers c ON o.customer_id = c.id",
            &policy,
        );
        assert_eq!(
            error_kinds(&result),
            vec![(ErrorKind::UnknownTable, "public.customers".to_string())]
        );
    }

    #[test]
    fn side_effect_functions_are_forbidden() {
        for (sql, function) in [
            ("SELECT setval('orders_id_seq', 1)", "setval"),
            ("SELECT pg_terminate_backend(123)", "pg_terminate_backend"),
            ("SELECT dblink_exec('host=x', 'DROP TABLE orders')", "dblink_exec"),
            ("SELECT o.id FROM orders o WHERE pg_catalog.pg_sleep(5) IS NOT NULL", "pg_sleep"),
            ("SELECT lo_import('/etc/passwd')", "lo_import"),
            ("SELECT pg_read_binary_file('/etc/passwd')", "pg_read_binary_file"),
        ] {
            let result = check(sql);
            assert_eq!(
                error_kinds(&result),
                vec![(ErrorKind::ForbiddenStatement, function.to_string())],
                "{}",
                sql
            );
        }
    }

    #[test]
    fn side_effect_function_in_subquery_is_forbidden() {
        let result = check("SELECT o.id FROM orders o WHERE o.id IN (SELECT nextval('orders_id_seq'))");
        assert_eq!(
            error_kinds(&result),
            vec![(ErrorKind::ForbiddenStatement, "nextval".to_string())]
        );
    }

    #[test]
    fn read_only_functions_are_accepted() {
        let result = check("SELECT lower(o.status), now() FROM orders o");
        assert!(result.is_accepted(), "{:?}", result);
        assert!(is_side_effect_function("pg_advisory_xact_lock"));
        assert!(!is_side_effect_function("pg_size_pretty"));
    }

    #[test]
    fn using_column_must_exist_on_both_sides() {
        let result = check("SELECT o.id FROM orders o JOIN customers c USING (no_such_column)");
        assert_eq!(
            error_kinds(&result),
            vec![
                (ErrorKind::UnknownColumn, "public.customers.no_such_column".to_string()),
                (ErrorKind::UnknownColumn, "public.orders.no_such_column".to_string()),
            ]
        );

        let result = check("SELECT o.status FROM orders o JOIN customers c USING (email)");
        assert_eq!(
            error_kinds(&result),
            vec![(ErrorKind::UnknownColumn, "public.orders.email".to_string())]
        );
    }

    #[test]
    fn using_column_present_on_both_sides_is_accepted() {
        let result = check("SELECT o.status FROM orders o JOIN customers c USING (id)");
        match result {
            ValidationResult::Accepted(accepted) => {
                assert!(accepted.columns_used.contains(&"public.customers.id".to_string()));
                assert!(accepted.columns_used.contains(&"public.orders.id".to_string()));
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn syntax_error_is_a_rejection() {
        let result = check("SELECT id FROM orders WHERE = 1");
        assert_eq!(result.errors()[0].kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn accepted_sql_is_stable() {
        let first = check("select o.status, count(*) as n from orders o where o.id > 10 group by o.status");
        let sql = first.sql().unwrap().to_string();
        let second = check(&sql);
        assert_eq!(second.sql(), Some(sql.as_str()));
    }

    #[test]
    fn result_serializes_with_status_tag() {
        let json = serde_json::to_value(check("TRUNCATE orders")).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["errors"][0]["kind"], "FORBIDDEN_STATEMENT");
    }
}
