//! SQL parsing using datafusion-sqlparser-rs
//!
//! Parses SQL text with the PostgreSQL dialect and lowers the result into the
//! read-only [`Statement`] tree. Statements outside the read-only subset become
//! [`Statement::Forbidden`]; read-only constructs the tree cannot represent are
//! rejected with a [`SyntaxError`].

use crate::ast::{
    normalize_ident, split_compound, Clause, ColumnRef, Cte, CteBinding, Distinct, FromItem, Join,
    JoinCondition, JoinKind, Select, SelectItem, SetOperation, SetOperator, Statement, Subquery,
    TableRef, TableSource,
};
use nl2sql_core::{Diagnostic, ErrorKind};
use regex::Regex;
use sqlparser::ast::{self as sql, Expr, ObjectName, Query, SetExpr, SetQuantifier, Visit, Visitor};
use sqlparser::dialect::{Dialect, PostgreSqlDialect};
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::OnceLock;

fn position_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Line: (\d+), Column:? (\d+)").unwrap_or_else(|_| unreachable!("static regex"))
    })
}

/// SQL parser with a configurable dialect
pub struct SqlParser {
    dialect: Box<dyn Dialect>,
}

impl SqlParser {
    /// Create a SQL parser for PostgreSQL
    pub fn postgres() -> Self {
        Self {
            dialect: Box::new(PostgreSqlDialect {}),
        }
    }

    /// Create a parser for an arbitrary sqlparser dialect
    pub fn from_dialect(dialect: Box<dyn Dialect>) -> Self {
        Self { dialect }
    }

    /// Parse exactly one statement
    pub fn parse(&self, sql: &str) -> Result<Statement, SyntaxError> {
        let text = sql.trim();
        if text.is_empty() {
            return Err(SyntaxError::new("SQL cannot be empty"));
        }

        let statements = match Parser::parse_sql(&*self.dialect, text) {
            Ok(statements) => statements,
            Err(e) => {
                // Mutating statements the grammar cannot finish are still mutating
                if let Some(keyword) = self.leading_keyword(text) {
                    if keyword != "SELECT" && keyword != "WITH" {
                        tracing::debug!(%keyword, error = %e, "unparseable non-query statement");
                        return Ok(Statement::Forbidden { keyword });
                    }
                }
                return Err(SyntaxError::from_message(e.to_string()));
            }
        };

        let statement = match statements.as_slice() {
            [single] => single,
            [] => return Err(SyntaxError::new("SQL cannot be empty")),
            many => {
                return Err(SyntaxError::new(format!(
                    "Expected a single statement, found {}",
                    many.len()
                )))
            }
        };

        let lowered = match statement {
            sql::Statement::Query(query) => lower_query(query)?,
            other => Statement::Forbidden {
                keyword: first_word(&other.to_string()),
            },
        };

        if lowered.forbidden_keywords().is_empty() {
            check_relations(statement, &lowered)?;
        }

        Ok(lowered)
    }

    /// Upper-cased leading keyword, if the text starts with one
    fn leading_keyword(&self, text: &str) -> Option<String> {
        let tokens = Tokenizer::new(&*self.dialect, text).tokenize().ok()?;
        let first = tokens
            .into_iter()
            .find(|t| !matches!(t, Token::Whitespace(_)))?;

        match first {
            Token::Word(word) if word.keyword != Keyword::NoKeyword && word.quote_style.is_none() => {
                Some(word.value.to_uppercase())
            }
            _ => None,
        }
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::postgres()
    }
}

/// Parse failure with a best-effort source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// 1-indexed (line, column)
    pub position: Option<(u64, u64)>,

    pub message: String,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            position: None,
            message: message.into(),
        }
    }

    /// Construct from a parser message, extracting `Line: x, Column: y`
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let position = position_pattern().captures(&message).and_then(|caps| {
            let line = caps.get(1)?.as_str().parse().ok()?;
            let column = caps.get(2)?.as_str().parse().ok()?;
            Some((line, column))
        });

        Self { position, message }
    }

    fn unsupported(construct: impl fmt::Display) -> Self {
        Self::new(format!("Unsupported construct: {}", construct))
    }

    /// Rejection finding for this error
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(ErrorKind::SyntaxError, self.position_label(), self.to_string())
    }

    /// `line:column`, or an empty string when unknown
    pub fn position_label(&self) -> String {
        self.position
            .map(|(line, column)| format!("{}:{}", line, column))
            .unwrap_or_default()
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some((line, column)) => write!(
                f,
                "Syntax error at line {}, column {}: {}",
                line, column, self.message
            ),
            None => write!(f, "Syntax error: {}", self.message),
        }
    }
}

impl std::error::Error for SyntaxError {}

fn first_word(text: &str) -> String {
    text.split_whitespace()
        .next()
        .unwrap_or("UNKNOWN")
        .trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .to_uppercase()
}

fn literal_u64(expr: &Expr, clause: &str) -> Result<u64, SyntaxError> {
    match expr {
        Expr::Value(sql::Value::Number(n, _)) => n
            .parse()
            .map_err(|_| SyntaxError::new(format!("{} must be a non-negative integer, got {}", clause, n))),
        other => Err(SyntaxError::unsupported(format!("non-literal {} {}", clause, other))),
    }
}

fn lower_query(query: &Query) -> Result<Statement, SyntaxError> {
    if let Some(lock) = query.locks.first() {
        return Ok(Statement::Forbidden {
            keyword: format!("FOR {}", lock.lock_type),
        });
    }
    if query.fetch.is_some() {
        return Err(SyntaxError::unsupported("FETCH"));
    }
    if !query.limit_by.is_empty() {
        return Err(SyntaxError::unsupported("LIMIT BY"));
    }
    if query.for_clause.is_some() {
        return Err(SyntaxError::unsupported("FOR clause"));
    }

    let limit = query
        .limit
        .as_ref()
        .map(|e| literal_u64(e, "LIMIT"))
        .transpose()?;
    let offset = query
        .offset
        .as_ref()
        .map(|o| literal_u64(&o.value, "OFFSET"))
        .transpose()?;
    let order_by = query
        .order_by
        .as_ref()
        .map(|o| o.exprs.clone())
        .unwrap_or_default();

    let body = lower_set_expr(&query.body)?;
    let body = apply_modifiers(body, order_by, limit, offset)?;

    let Some(with) = &query.with else {
        return Ok(body);
    };

    let mut bindings = Vec::with_capacity(with.cte_tables.len());
    for cte in &with.cte_tables {
        if cte.materialized.is_some() {
            return Err(SyntaxError::unsupported("MATERIALIZED common table expression"));
        }
        bindings.push(CteBinding {
            alias: cte.alias.clone(),
            name: normalize_ident(&cte.alias.name),
            query: Box::new(lower_query(&cte.query)?),
        });
    }

    Ok(Statement::Cte(Cte {
        recursive: with.recursive,
        bindings,
        body: Box::new(body),
    }))
}

/// Attach query-level ORDER BY / LIMIT / OFFSET to a lowered body
fn apply_modifiers(
    body: Statement,
    order_by: Vec<sql::OrderByExpr>,
    limit: Option<u64>,
    offset: Option<u64>,
) -> Result<Statement, SyntaxError> {
    if order_by.is_empty() && limit.is_none() && offset.is_none() {
        return Ok(body);
    }

    match body {
        Statement::Select(mut select) if select.is_bare() => {
            let mut collector = ReferenceCollector::new(Clause::OrderBy);
            for expr in &order_by {
                let _ = expr.visit(&mut collector);
            }
            select.references.extend(collector.references);
            select.functions.extend(collector.functions);
            select.subqueries.extend(lower_subqueries(&collector.subqueries)?);
            select.order_by = order_by;
            select.limit = limit;
            select.offset = offset;
            Ok(Statement::Select(select))
        }
        Statement::SetOperation(mut op)
            if op.order_by.is_empty() && op.limit.is_none() && op.offset.is_none() =>
        {
            let mut collector = ReferenceCollector::new(Clause::OrderBy);
            for expr in &order_by {
                let _ = expr.visit(&mut collector);
            }
            op.functions.extend(collector.functions);
            op.subqueries.extend(lower_subqueries(&collector.subqueries)?);
            op.order_by = order_by;
            op.limit = limit;
            op.offset = offset;
            Ok(Statement::SetOperation(op))
        }
        forbidden @ Statement::Forbidden { .. } => Ok(forbidden),
        _ => Err(SyntaxError::unsupported("nested ORDER BY / LIMIT / OFFSET")),
    }
}

fn lower_set_expr(body: &SetExpr) -> Result<Statement, SyntaxError> {
    match body {
        SetExpr::Select(select) => lower_select(select),
        SetExpr::Query(query) => lower_query(query),
        SetExpr::SetOperation {
            op,
            set_quantifier,
            left,
            right,
        } => {
            let op = match (op, set_quantifier) {
                (sql::SetOperator::Union, SetQuantifier::All) => SetOperator::UnionAll,
                (sql::SetOperator::Union, SetQuantifier::None | SetQuantifier::Distinct) => {
                    SetOperator::Union
                }
                (sql::SetOperator::Intersect, SetQuantifier::None | SetQuantifier::Distinct) => {
                    SetOperator::Intersect
                }
                (sql::SetOperator::Except, SetQuantifier::None | SetQuantifier::Distinct) => {
                    SetOperator::Except
                }
                (op, quantifier) => {
                    return Err(SyntaxError::unsupported(format!("{} {}", op, quantifier)))
                }
            };

            Ok(Statement::SetOperation(SetOperation {
                left: Box::new(lower_set_expr(left)?),
                op,
                right: Box::new(lower_set_expr(right)?),
                order_by: Vec::new(),
                limit: None,
                offset: None,
                subqueries: Vec::new(),
                functions: Vec::new(),
            }))
        }
        other => Ok(Statement::Forbidden {
            keyword: first_word(&other.to_string()),
        }),
    }
}

fn lower_select(select: &sql::Select) -> Result<Statement, SyntaxError> {
    if select.into.is_some() {
        return Ok(Statement::Forbidden {
            keyword: "SELECT INTO".to_string(),
        });
    }
    if select.top.is_some() {
        return Err(SyntaxError::unsupported("TOP"));
    }
    if select.qualify.is_some() {
        return Err(SyntaxError::unsupported("QUALIFY"));
    }
    if !select.lateral_views.is_empty() {
        return Err(SyntaxError::unsupported("LATERAL VIEW"));
    }

    let mut collector = ReferenceCollector::new(Clause::Projection);

    let distinct = match &select.distinct {
        None => Distinct::None,
        Some(sql::Distinct::Distinct) => Distinct::All,
        Some(sql::Distinct::On(exprs)) => {
            collector.collect(exprs, Clause::Distinct);
            Distinct::On(exprs.clone())
        }
    };

    let mut items = Vec::with_capacity(select.projection.len());
    for item in &select.projection {
        collector.collect(item, Clause::Projection);
        items.push(lower_select_item(item)?);
    }

    let mut from = Vec::with_capacity(select.from.len());
    for table in &select.from {
        from.push(lower_from_item(table, &mut collector)?);
    }

    if let Some(selection) = &select.selection {
        collector.collect(selection, Clause::Where);
    }

    let group_by = match &select.group_by {
        sql::GroupByExpr::All(_) => return Err(SyntaxError::unsupported("GROUP BY ALL")),
        sql::GroupByExpr::Expressions(exprs, modifiers) => {
            if !modifiers.is_empty() {
                return Err(SyntaxError::unsupported("GROUP BY modifiers"));
            }
            collector.collect(exprs, Clause::GroupBy);
            exprs.clone()
        }
    };

    if let Some(having) = &select.having {
        collector.collect(having, Clause::Having);
    }
    collector.collect(&select.named_window, Clause::Window);

    let subqueries = lower_subqueries(&collector.subqueries)?;

    Ok(Statement::Select(Box::new(Select {
        distinct,
        items,
        from,
        selection: select.selection.clone(),
        group_by,
        having: select.having.clone(),
        windows: select.named_window.clone(),
        order_by: Vec::new(),
        limit: None,
        offset: None,
        references: collector.references,
        subqueries,
        functions: collector.functions,
    })))
}

fn lower_subqueries(queries: &[Query]) -> Result<Vec<Subquery>, SyntaxError> {
    queries
        .iter()
        .map(|query| {
            Ok(Subquery {
                written: query.to_string(),
                statement: lower_query(query)?,
            })
        })
        .collect()
}

fn lower_select_item(item: &sql::SelectItem) -> Result<SelectItem, SyntaxError> {
    match item {
        sql::SelectItem::UnnamedExpr(expr) => Ok(SelectItem::from_expr(expr.clone(), None)),
        sql::SelectItem::ExprWithAlias { expr, alias } => {
            Ok(SelectItem::from_expr(expr.clone(), Some(alias.clone())))
        }
        sql::SelectItem::Wildcard(options) => {
            if !options.to_string().trim().is_empty() {
                return Err(SyntaxError::unsupported(format!("* {}", options)));
            }
            Ok(SelectItem::Wildcard)
        }
        sql::SelectItem::QualifiedWildcard(name, options) => {
            if !options.to_string().trim().is_empty() {
                return Err(SyntaxError::unsupported(format!("{}.* {}", name, options)));
            }
            Ok(SelectItem::QualifiedWildcard {
                qualifier: object_name_parts(name).join("."),
                name: name.clone(),
            })
        }
    }
}

fn lower_from_item(
    table: &sql::TableWithJoins,
    collector: &mut ReferenceCollector,
) -> Result<FromItem, SyntaxError> {
    let source = lower_table_factor(&table.relation)?;

    let mut joins = Vec::with_capacity(table.joins.len());
    for join in &table.joins {
        let (kind, constraint) = match &join.join_operator {
            sql::JoinOperator::Inner(c) => (JoinKind::Inner, Some(c)),
            sql::JoinOperator::LeftOuter(c) => (JoinKind::Left, Some(c)),
            sql::JoinOperator::RightOuter(c) => (JoinKind::Right, Some(c)),
            sql::JoinOperator::FullOuter(c) => (JoinKind::Full, Some(c)),
            sql::JoinOperator::CrossJoin => (JoinKind::Cross, None),
            _ => return Err(SyntaxError::unsupported("join type")),
        };

        let condition = match constraint {
            Some(sql::JoinConstraint::On(expr)) => {
                collector.collect(expr, Clause::Join);
                JoinCondition::On(expr.clone())
            }
            Some(sql::JoinConstraint::Using(columns)) => {
                JoinCondition::Using(columns.iter().map(|c| c.to_string()).collect())
            }
            Some(sql::JoinConstraint::Natural) => JoinCondition::Natural,
            Some(sql::JoinConstraint::None) | None => JoinCondition::None,
        };

        joins.push(Join {
            kind,
            condition,
            source: lower_table_factor(&join.relation)?,
        });
    }

    Ok(FromItem { source, joins })
}

fn lower_table_factor(factor: &sql::TableFactor) -> Result<TableSource, SyntaxError> {
    match factor {
        sql::TableFactor::Table {
            name,
            alias,
            args,
            with_hints,
            ..
        } => {
            if args.is_some() {
                return Err(SyntaxError::unsupported(format!("table function {}", name)));
            }
            if !with_hints.is_empty() {
                return Err(SyntaxError::unsupported("table hints"));
            }
            Ok(TableSource::Table(TableRef {
                name: name.clone(),
                parts: object_name_parts(name),
                alias: alias.clone(),
            }))
        }
        sql::TableFactor::Derived {
            lateral,
            subquery,
            alias,
        } => Ok(TableSource::Derived {
            lateral: *lateral,
            query: Box::new(lower_query(subquery)?),
            alias: alias.clone(),
        }),
        other => Err(SyntaxError::unsupported(format!("FROM item {}", other))),
    }
}

fn object_name_parts(name: &ObjectName) -> Vec<String> {
    name.0.iter().map(normalize_ident).collect()
}

/// Collects column references, function calls and nested sub-queries at the
/// current query level; anything inside a nested query belongs to that query.
struct ReferenceCollector {
    depth: usize,
    clause: Clause,
    references: Vec<ColumnRef>,
    functions: Vec<String>,
    subqueries: Vec<Query>,
}

impl ReferenceCollector {
    fn new(clause: Clause) -> Self {
        Self {
            depth: 0,
            clause,
            references: Vec::new(),
            functions: Vec::new(),
            subqueries: Vec::new(),
        }
    }

    fn collect<T: Visit + ?Sized>(&mut self, node: &T, clause: Clause) {
        self.clause = clause;
        let _ = node.visit(self);
    }
}

impl Visitor for ReferenceCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if self.depth == 0 {
            self.subqueries.push(query.clone());
        }
        self.depth += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.depth = self.depth.saturating_sub(1);
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        if self.depth > 0 {
            return ControlFlow::Continue(());
        }

        match expr {
            Expr::Identifier(ident) => self.references.push(ColumnRef {
                qualifier: None,
                column: normalize_ident(ident),
                clause: self.clause,
            }),
            Expr::CompoundIdentifier(idents) if idents.len() >= 2 => {
                let (column, qualifier) = split_compound(idents);
                self.references.push(ColumnRef {
                    qualifier: Some(qualifier),
                    column,
                    clause: self.clause,
                });
            }
            Expr::Function(func) => {
                if let Some(name) = func.name.0.last() {
                    self.functions.push(name.value.to_lowercase());
                }
            }
            _ => {}
        }

        ControlFlow::Continue(())
    }
}

/// Every relation name the grammar saw
#[derive(Default)]
struct RelationCollector {
    names: BTreeSet<String>,
}

impl Visitor for RelationCollector {
    type Break = ();

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        self.names.insert(object_name_parts(relation).join("."));
        ControlFlow::Continue(())
    }
}

/// Fail when a relation in the source tree did not survive lowering
fn check_relations(original: &sql::Statement, lowered: &Statement) -> Result<(), SyntaxError> {
    let mut collector = RelationCollector::default();
    let _ = original.visit(&mut collector);

    let lowered_names: BTreeSet<String> = lowered
        .table_refs()
        .into_iter()
        .map(|t| t.qualified_name())
        .collect();

    match collector.names.difference(&lowered_names).next() {
        Some(missing) => Err(SyntaxError::unsupported(format!(
            "relation {} appears in a position that cannot be validated",
            missing
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(sql: &str) -> Statement {
        SqlParser::postgres().parse(sql).unwrap()
    }

    fn select(sql: &str) -> Select {
        match parse(sql) {
            Statement::Select(select) => *select,
            other => panic!("expected select, got {:?}", other),
        }
    }

    #[test]
    fn parse_simple_select() {
        let s = select("SELECT id, status FROM public.orders WHERE status = 'open'");
        assert_eq!(s.items.len(), 2);
        assert_eq!(s.from.len(), 1);
        match &s.from[0].source {
            TableSource::Table(t) => assert_eq!(t.qualified_name(), "public.orders"),
            other => panic!("unexpected source {:?}", other),
        }

        let columns: Vec<_> = s.references.iter().map(|r| r.display_name()).collect();
        assert_eq!(columns, vec!["id", "status", "status"]);
        assert_eq!(s.references[2].clause, Clause::Where);
    }

    #[test]
    fn parse_aggregate_projection() {
        let s = select("SELECT status, COUNT(*) FROM public.orders GROUP BY status");
        assert!(matches!(s.items[1], SelectItem::Aggregate { ref function, .. } if function == "COUNT"));
        assert!(s.is_aggregate_query());
        assert!(!s.has_wildcard());
    }

    #[test]
    fn parse_with_cte() {
        let stmt = parse("WITH active AS (SELECT * FROM users WHERE active) SELECT id FROM active");
        match stmt {
            Statement::Cte(cte) => {
                assert!(!cte.recursive);
                assert_eq!(cte.names().collect::<Vec<_>>(), vec!["active"]);
                assert!(matches!(*cte.body, Statement::Select(_)));
            }
            other => panic!("expected CTE, got {:?}", other),
        }
    }

    #[test]
    fn subqueries_are_lowered_separately() {
        let s = select(
            "SELECT o.id FROM orders o WHERE o.customer_id IN (SELECT c.id FROM customers c WHERE c.vip)",
        );
        assert_eq!(s.subqueries.len(), 1);
        // References inside the sub-query belong to it
        assert!(s.references.iter().all(|r| r.qualifier.as_deref() == Some("o")));
    }

    #[test]
    fn function_calls_are_collected_per_level() {
        let s = select(
            "SELECT pg_catalog.setval('s', 1), lower(o.status) FROM orders o \
             WHERE o.id IN (SELECT nextval('t'))",
        );
        assert_eq!(s.functions, vec!["setval", "lower"]);
        assert_eq!(s.subqueries[0].written, "SELECT nextval('t')");
        match &s.subqueries[0].statement {
            Statement::Select(inner) => assert_eq!(inner.functions, vec!["nextval"]),
            other => panic!("expected select, got {:?}", other),
        }
    }

    #[test]
    fn limit_and_offset_literals() {
        let s = select("SELECT id FROM orders ORDER BY id LIMIT 10 OFFSET 20");
        assert_eq!(s.limit, Some(10));
        assert_eq!(s.offset, Some(20));
        assert_eq!(s.order_by.len(), 1);

        let s = select("SELECT id FROM orders LIMIT ALL");
        assert_eq!(s.limit, None);
    }

    #[test]
    fn mutating_statements_are_forbidden() {
        for (sql, keyword) in [
            ("DELETE FROM public.orders WHERE id = '1'", "DELETE"),
            ("insert into orders (id) values (1)", "INSERT"),
            ("UPDATE orders SET status = 'x'", "UPDATE"),
            ("DROP TABLE orders", "DROP"),
            ("TRUNCATE orders", "TRUNCATE"),
            ("CREATE TABLE t (id int)", "CREATE"),
            ("ALTER TABLE orders ADD COLUMN x int", "ALTER"),
        ] {
            assert_eq!(
                parse(sql),
                Statement::Forbidden { keyword: keyword.to_string() },
                "{}",
                sql
            );
        }
    }

    #[test]
    fn unparseable_mutation_is_still_forbidden() {
        assert_eq!(
            parse("DELETE orders everything please"),
            Statement::Forbidden { keyword: "DELETE".to_string() }
        );
    }

    #[test]
    fn select_into_and_locks_are_forbidden() {
        assert_eq!(
            parse("SELECT * INTO backup FROM orders"),
            Statement::Forbidden { keyword: "SELECT INTO".to_string() }
        );
        assert_eq!(
            parse("SELECT id FROM orders FOR UPDATE"),
            Statement::Forbidden { keyword: "FOR UPDATE".to_string() }
        );
    }

    #[test]
    fn data_modifying_cte_is_nested_forbidden() {
        let stmt = parse("WITH added AS (INSERT INTO orders (id) VALUES (1) RETURNING id) SELECT id FROM added");
        assert_eq!(stmt.forbidden_keywords(), vec!["INSERT"]);
    }

    #[test]
    fn syntax_errors_carry_position() {
        let err = SqlParser::postgres().parse("SELECT id FROM orders WHERE = 1").unwrap_err();
        assert!(err.position.is_some());
        assert!(err.to_string().starts_with("Syntax error"));
    }

    #[test]
    fn empty_and_multiple_statements_fail() {
        let parser = SqlParser::postgres();
        assert!(parser.parse("   ").is_err());
        assert!(parser.parse("SELECT 1; SELECT 2").is_err());
        assert!(parser.parse("SELECT 1;").is_ok());
    }

    #[test]
    fn unsupported_constructs_fail_closed() {
        let parser = SqlParser::postgres();
        assert!(parser.parse("SELECT * FROM generate_series(1, 10)").is_err());
        assert!(parser.parse("SELECT id FROM orders FETCH FIRST 5 ROWS ONLY").is_err());
        assert!(parser.parse("SELECT id FROM orders LIMIT $1").is_err());
        assert!(parser.parse("SELECT id FROM (orders o JOIN customers c ON o.customer_id = c.id)").is_err());
    }

    #[test]
    fn position_extraction() {
        let err = SyntaxError::from_message("sql parser error: Expected: an expression, found: EOF at Line: 3, Column: 14");
        assert_eq!(err.position, Some((3, 14)));
        assert_eq!(err.position_label(), "3:14");

        let err = SyntaxError::new("plain");
        assert_eq!(err.position_label(), "");
        assert_eq!(err.to_string(), "Syntax error: plain");
    }
}
