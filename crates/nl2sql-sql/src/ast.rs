//! Read-only query AST
//!
//! A deliberately small tree covering the SELECT subset the guardrail
//! understands. Expressions are kept as `sqlparser` nodes so they print back
//! canonically; everything the guardrail reasons about (sources, column
//! references, projection shape, limits) is lifted into plain fields.

use sqlparser::ast::{Expr, Ident, NamedWindowDefinition, ObjectName, OrderByExpr, TableAlias};

/// Aggregate functions that make a projection item an aggregate call
const AGGREGATE_FUNCTIONS: &[&str] = &[
    "COUNT", "SUM", "AVG", "MIN", "MAX", "STDDEV", "STDDEV_POP", "STDDEV_SAMP", "VARIANCE",
    "VAR_POP", "VAR_SAMP", "ARRAY_AGG", "STRING_AGG", "JSON_AGG", "JSONB_AGG", "JSON_OBJECT_AGG",
    "BOOL_AND", "BOOL_OR", "EVERY", "BIT_AND", "BIT_OR", "PERCENTILE_CONT", "PERCENTILE_DISC",
    "MODE",
];

/// A parsed statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Box<Select>),
    SetOperation(SetOperation),
    Cte(Cte),
    /// Anything that is not a read-only query, tagged with its leading keyword
    Forbidden { keyword: String },
}

impl Statement {
    /// The statement after unwrapping any `WITH` bindings
    pub fn body(&self) -> &Statement {
        match self {
            Statement::Cte(cte) => cte.body.body(),
            other => other,
        }
    }

    /// Top-level select, if the unwrapped body is a plain select
    pub fn top_level_select(&self) -> Option<&Select> {
        match self.body() {
            Statement::Select(select) => Some(select),
            _ => None,
        }
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Statement::Forbidden { .. })
    }

    /// Keywords of every forbidden node in the tree, in walk order
    pub fn forbidden_keywords(&self) -> Vec<&str> {
        let mut found = Vec::new();
        self.for_each(&mut |stmt| {
            if let Statement::Forbidden { keyword } = stmt {
                found.push(keyword.as_str());
            }
        });
        found
    }

    /// Every named table reference in the tree (including CTE references)
    pub fn table_refs(&self) -> Vec<&TableRef> {
        let mut refs = Vec::new();
        self.for_each(&mut |stmt| {
            if let Statement::Select(select) = stmt {
                for item in &select.from {
                    for source in item.sources() {
                        if let TableSource::Table(table) = source {
                            refs.push(table);
                        }
                    }
                }
            }
        });
        refs
    }

    /// Pre-order walk over this statement and every nested statement
    pub fn for_each<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a Statement),
    {
        f(self);
        match self {
            Statement::Select(select) => {
                for item in &select.from {
                    for source in item.sources() {
                        if let TableSource::Derived { query, .. } = source {
                            query.for_each(f);
                        }
                    }
                }
                for subquery in &select.subqueries {
                    subquery.statement.for_each(f);
                }
            }
            Statement::SetOperation(op) => {
                op.left.for_each(f);
                op.right.for_each(f);
                for subquery in &op.subqueries {
                    subquery.statement.for_each(f);
                }
            }
            Statement::Cte(cte) => {
                for binding in &cte.bindings {
                    binding.query.for_each(f);
                }
                cte.body.for_each(f);
            }
            Statement::Forbidden { .. } => {}
        }
    }

    /// Copy of this statement with `LIMIT` set on the top-level select
    ///
    /// Statements whose body is not a plain select are returned unchanged.
    pub fn with_limit(&self, limit: u64) -> Statement {
        match self {
            Statement::Select(select) => {
                let mut select = select.clone();
                select.limit = Some(limit);
                Statement::Select(select)
            }
            Statement::Cte(cte) => Statement::Cte(Cte {
                recursive: cte.recursive,
                bindings: cte.bindings.clone(),
                body: Box::new(cte.body.with_limit(limit)),
            }),
            other => other.clone(),
        }
    }
}

/// `SELECT` core with its own ORDER BY / LIMIT / OFFSET
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub distinct: Distinct,
    pub items: Vec<SelectItem>,
    pub from: Vec<FromItem>,
    pub selection: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub windows: Vec<NamedWindowDefinition>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,

    /// Column references found in this select's own expressions
    pub references: Vec<ColumnRef>,

    /// Sub-queries nested inside this select's expressions
    pub subqueries: Vec<Subquery>,

    /// Lower-cased names of functions called in this select's own expressions
    pub functions: Vec<String>,
}

impl Select {
    /// Whether any item projects `*` or `t.*`
    pub fn has_wildcard(&self) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, SelectItem::Wildcard | SelectItem::QualifiedWildcard { .. }))
    }

    /// Grouped, or every projected item is an aggregate call
    pub fn is_aggregate_query(&self) -> bool {
        !self.group_by.is_empty()
            || (!self.items.is_empty()
                && self
                    .items
                    .iter()
                    .all(|item| matches!(item, SelectItem::Aggregate { .. })))
    }

    /// Normalized output aliases
    pub fn output_aliases(&self) -> Vec<String> {
        self.items.iter().filter_map(|item| item.alias_name()).collect()
    }

    /// No ORDER BY, LIMIT or OFFSET of its own
    pub fn is_bare(&self) -> bool {
        self.order_by.is_empty() && self.limit.is_none() && self.offset.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Distinct {
    None,
    All,
    On(Vec<Expr>),
}

/// A projected item
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// Bare column, `status`
    Column {
        name: String,
        expr: Expr,
        alias: Option<Ident>,
    },

    /// Qualified column, `o.status`
    Qualified {
        qualifier: String,
        column: String,
        expr: Expr,
        alias: Option<Ident>,
    },

    /// Aggregate call, `COUNT(*)`
    Aggregate {
        function: String,
        expr: Expr,
        alias: Option<Ident>,
    },

    /// Any other expression
    Expression { expr: Expr, alias: Option<Ident> },

    Wildcard,

    /// `t.*`
    QualifiedWildcard { qualifier: String, name: ObjectName },
}

impl SelectItem {
    /// Classify an expression into the matching item variant
    pub fn from_expr(expr: Expr, alias: Option<Ident>) -> Self {
        match &expr {
            Expr::Identifier(ident) => SelectItem::Column {
                name: normalize_ident(ident),
                expr,
                alias,
            },
            Expr::CompoundIdentifier(idents) if idents.len() >= 2 => {
                let (column, qualifier) = split_compound(idents);
                SelectItem::Qualified {
                    qualifier,
                    column,
                    expr,
                    alias,
                }
            }
            _ => match aggregate_name(&expr) {
                Some(function) => SelectItem::Aggregate {
                    function,
                    expr,
                    alias,
                },
                None => SelectItem::Expression { expr, alias },
            },
        }
    }

    pub fn alias(&self) -> Option<&Ident> {
        match self {
            SelectItem::Column { alias, .. }
            | SelectItem::Qualified { alias, .. }
            | SelectItem::Aggregate { alias, .. }
            | SelectItem::Expression { alias, .. } => alias.as_ref(),
            SelectItem::Wildcard | SelectItem::QualifiedWildcard { .. } => None,
        }
    }

    pub fn alias_name(&self) -> Option<String> {
        self.alias().map(normalize_ident)
    }
}

/// One comma-separated FROM entry with its joins
#[derive(Debug, Clone, PartialEq)]
pub struct FromItem {
    pub source: TableSource,
    pub joins: Vec<Join>,
}

impl FromItem {
    /// The leading source followed by each joined source
    pub fn sources(&self) -> impl Iterator<Item = &TableSource> {
        std::iter::once(&self.source).chain(self.joins.iter().map(|j| &j.source))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    Table(TableRef),
    Derived {
        lateral: bool,
        query: Box<Statement>,
        alias: Option<TableAlias>,
    },
}

impl TableSource {
    /// Normalized alias, if any
    pub fn alias_name(&self) -> Option<String> {
        match self {
            TableSource::Table(table) => table.alias_name(),
            TableSource::Derived { alias, .. } => alias.as_ref().map(|a| normalize_ident(&a.name)),
        }
    }
}

/// Named table reference
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    /// Name as written, for printing
    pub name: ObjectName,

    /// Normalized name parts, `["public", "orders"]`
    pub parts: Vec<String>,

    pub alias: Option<TableAlias>,
}

impl TableRef {
    pub fn alias_name(&self) -> Option<String> {
        self.alias.as_ref().map(|a| normalize_ident(&a.name))
    }

    /// Normalized dotted name, `public.orders`
    pub fn qualified_name(&self) -> String {
        self.parts.join(".")
    }

    /// Last name part
    pub fn table_name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or("")
    }

    /// Schema part of a two- or three-part name
    pub fn schema_name(&self) -> Option<&str> {
        match self.parts.len() {
            0 | 1 => None,
            n => Some(self.parts[n - 2].as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub condition: JoinCondition,
    pub source: TableSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinCondition {
    On(Expr),
    /// Column names as written
    Using(Vec<String>),
    Natural,
    None,
}

/// `left op right`, with modifiers applying to the combined result
#[derive(Debug, Clone, PartialEq)]
pub struct SetOperation {
    pub left: Box<Statement>,
    pub op: SetOperator,
    pub right: Box<Statement>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,

    /// Sub-queries nested inside ORDER BY expressions
    pub subqueries: Vec<Subquery>,

    /// Functions called in ORDER BY expressions
    pub functions: Vec<String>,
}

/// A query nested inside an expression
///
/// Expressions print through `sqlparser`, so the query's text as `sqlparser`
/// prints it is kept to swap in the canonical rendering of `statement`.
#[derive(Debug, Clone, PartialEq)]
pub struct Subquery {
    pub written: String,
    pub statement: Statement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    UnionAll,
    Intersect,
    Except,
}

/// `WITH [RECURSIVE] bindings body`
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub recursive: bool,
    pub bindings: Vec<CteBinding>,
    pub body: Box<Statement>,
}

impl Cte {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CteBinding {
    /// Alias as written, with optional column list
    pub alias: TableAlias,

    /// Normalized binding name
    pub name: String,

    pub query: Box<Statement>,
}

/// A column reference found in an expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Normalized qualifier, `o` or `public.orders`
    pub qualifier: Option<String>,

    /// Normalized column name
    pub column: String,

    pub clause: Clause,
}

impl ColumnRef {
    pub fn display_name(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{}.{}", q, self.column),
            None => self.column.clone(),
        }
    }
}

/// Clause a column reference appears in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Clause {
    Projection,
    Distinct,
    Join,
    Where,
    GroupBy,
    Having,
    Window,
    OrderBy,
}

impl Clause {
    /// Clauses where output aliases are visible
    pub fn sees_output_aliases(&self) -> bool {
        matches!(self, Clause::GroupBy | Clause::Having | Clause::OrderBy)
    }
}

/// Unquoted identifiers fold to lower case; quoted ones keep their spelling
pub fn normalize_ident(ident: &Ident) -> String {
    if ident.quote_style.is_some() {
        ident.value.clone()
    } else {
        ident.value.to_lowercase()
    }
}

/// Normalize a printed identifier: `"Status"` keeps its spelling, `Status` folds
pub fn normalize_written(text: &str) -> String {
    match text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        Some(quoted) => quoted.replace("\"\"", "\""),
        None => text.to_lowercase(),
    }
}

/// Split `a.b.c` into (`c`, `a.b`)
pub(crate) fn split_compound(idents: &[Ident]) -> (String, String) {
    let parts: Vec<String> = idents.iter().map(normalize_ident).collect();
    let (column, qualifier) = parts.split_last().map_or_else(
        || (String::new(), Vec::new()),
        |(last, rest)| (last.clone(), rest.to_vec()),
    );
    (column, qualifier.join("."))
}

/// Upper-cased function name if `expr` is a plain (non-window) aggregate call
pub fn aggregate_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Function(func) if func.over.is_none() => {
            let name = func.name.0.last()?.value.to_uppercase();
            AGGREGATE_FUNCTIONS.contains(&name.as_str()).then_some(name)
        }
        Expr::Nested(inner) => aggregate_name(inner),
        _ => None,
    }
}
