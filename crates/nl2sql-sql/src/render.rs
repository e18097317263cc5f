//! Deterministic SQL printing
//!
//! Single line, upper-case keywords, `table alias` without `AS`.
//! Printing a parsed statement and parsing the output again yields a tree
//! that prints identically.
//!
//! Expressions print through `sqlparser`, which writes `table AS alias`
//! inside sub-queries; each sub-query's text is replaced with its own
//! canonical rendering afterwards.

use crate::ast::{
    Cte, Distinct, FromItem, Join, JoinCondition, JoinKind, Select, SelectItem, SetOperation,
    SetOperator, Statement, Subquery, TableSource,
};
use std::fmt::{self, Display, Formatter};

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_modifiers(
    f: &mut Formatter<'_>,
    order_by: &[sqlparser::ast::OrderByExpr],
    limit: Option<u64>,
    offset: Option<u64>,
) -> fmt::Result {
    if !order_by.is_empty() {
        write!(f, " ORDER BY ")?;
        write_list(f, order_by)?;
    }
    if let Some(limit) = limit {
        write!(f, " LIMIT {}", limit)?;
    }
    if let Some(offset) = offset {
        write!(f, " OFFSET {}", offset)?;
    }
    Ok(())
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(select) => write!(f, "{}", select),
            Statement::SetOperation(op) => write!(f, "{}", op),
            Statement::Cte(cte) => write!(f, "{}", cte),
            Statement::Forbidden { keyword } => write!(f, "{}", keyword),
        }
    }
}

/// Swap each sub-query's `sqlparser` text for its canonical rendering
fn with_subqueries(text: String, subqueries: &[Subquery]) -> String {
    subqueries.iter().fold(text, |text, subquery| {
        let canonical = subquery.statement.to_string();
        if canonical == subquery.written {
            text
        } else {
            text.replace(&subquery.written, &canonical)
        }
    })
}

impl Display for Select {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let text = SelectCore(self).to_string();
        f.write_str(&with_subqueries(text, &self.subqueries))
    }
}

struct SelectCore<'a>(&'a Select);

impl Display for SelectCore<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let SelectCore(select) = self;
        write!(f, "SELECT ")?;
        match &select.distinct {
            Distinct::None => {}
            Distinct::All => write!(f, "DISTINCT ")?,
            Distinct::On(exprs) => {
                write!(f, "DISTINCT ON (")?;
                write_list(f, exprs)?;
                write!(f, ") ")?;
            }
        }
        write_list(f, &select.items)?;

        if !select.from.is_empty() {
            write!(f, " FROM ")?;
            write_list(f, &select.from)?;
        }
        if let Some(selection) = &select.selection {
            write!(f, " WHERE {}", selection)?;
        }
        if !select.group_by.is_empty() {
            write!(f, " GROUP BY ")?;
            write_list(f, &select.group_by)?;
        }
        if let Some(having) = &select.having {
            write!(f, " HAVING {}", having)?;
        }
        if !select.windows.is_empty() {
            write!(f, " WINDOW ")?;
            write_list(f, &select.windows)?;
        }
        write_modifiers(f, &select.order_by, select.limit, select.offset)
    }
}

impl Display for SelectItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SelectItem::Column { expr, alias, .. }
            | SelectItem::Qualified { expr, alias, .. }
            | SelectItem::Aggregate { expr, alias, .. }
            | SelectItem::Expression { expr, alias } => {
                write!(f, "{}", expr)?;
                if let Some(alias) = alias {
                    write!(f, " AS {}", alias)?;
                }
                Ok(())
            }
            SelectItem::Wildcard => write!(f, "*"),
            SelectItem::QualifiedWildcard { name, .. } => write!(f, "{}.*", name),
        }
    }
}

impl Display for FromItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)?;
        for join in &self.joins {
            write!(f, " {}", join)?;
        }
        Ok(())
    }
}

impl Display for TableSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TableSource::Table(table) => {
                write!(f, "{}", table.name)?;
                if let Some(alias) = &table.alias {
                    write!(f, " {}", alias)?;
                }
                Ok(())
            }
            TableSource::Derived {
                lateral,
                query,
                alias,
            } => {
                if *lateral {
                    write!(f, "LATERAL ")?;
                }
                write!(f, "({})", query)?;
                if let Some(alias) = alias {
                    write!(f, " {}", alias)?;
                }
                Ok(())
            }
        }
    }
}

impl Display for Join {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let keyword = match self.kind {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
            JoinKind::Cross => "CROSS JOIN",
        };

        match &self.condition {
            JoinCondition::Natural => write!(f, "NATURAL {} {}", keyword, self.source),
            JoinCondition::On(expr) => write!(f, "{} {} ON {}", keyword, self.source, expr),
            JoinCondition::Using(columns) => {
                write!(f, "{} {} USING (", keyword, self.source)?;
                write_list(f, columns)?;
                write!(f, ")")
            }
            JoinCondition::None => write!(f, "{} {}", keyword, self.source),
        }
    }
}

impl Display for SetOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SetOperator::Union => write!(f, "UNION"),
            SetOperator::UnionAll => write!(f, "UNION ALL"),
            SetOperator::Intersect => write!(f, "INTERSECT"),
            SetOperator::Except => write!(f, "EXCEPT"),
        }
    }
}

/// Set-operation operands print bare only when they are a select without
/// modifiers of their own
fn write_operand(f: &mut Formatter<'_>, operand: &Statement) -> fmt::Result {
    match operand {
        Statement::Select(select) if select.is_bare() => write!(f, "{}", select),
        other => write!(f, "({})", other),
    }
}

impl Display for SetOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let text = SetOperationCore(self).to_string();
        f.write_str(&with_subqueries(text, &self.subqueries))
    }
}

struct SetOperationCore<'a>(&'a SetOperation);

impl Display for SetOperationCore<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let SetOperationCore(op) = self;
        write_operand(f, &op.left)?;
        write!(f, " {} ", op.op)?;
        write_operand(f, &op.right)?;
        write_modifiers(f, &op.order_by, op.limit, op.offset)
    }
}

impl Display for Cte {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "WITH ")?;
        if self.recursive {
            write!(f, "RECURSIVE ")?;
        }
        for (i, binding) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} AS ({})", binding.alias, binding.query)?;
        }
        write!(f, " {}", self.body)
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::SqlParser;
    use pretty_assertions::assert_eq;

    fn render(sql: &str) -> String {
        SqlParser::postgres().parse(sql).unwrap().to_string()
    }

    #[test]
    fn keywords_are_upper_cased_on_one_line() {
        assert_eq!(
            render("select o.id\nfrom public.orders as o\nwhere o.status = 'open'\norder by o.id desc limit 5"),
            "SELECT o.id FROM public.orders o WHERE o.status = 'open' ORDER BY o.id DESC LIMIT 5"
        );
    }

    #[test]
    fn joins_and_aliases() {
        assert_eq!(
            render("SELECT o.id, c.name AS customer FROM orders o LEFT OUTER JOIN customers c ON o.customer_id = c.id"),
            "SELECT o.id, c.name AS customer FROM orders o LEFT JOIN customers c ON o.customer_id = c.id"
        );
        assert_eq!(
            render("SELECT a.id FROM a JOIN b USING (id) CROSS JOIN c"),
            "SELECT a.id FROM a JOIN b USING (id) CROSS JOIN c"
        );
    }

    #[test]
    fn cte_and_set_operations() {
        assert_eq!(
            render("with recent as (select id from orders) select id from recent union all select id from archive.orders"),
            "WITH recent AS (SELECT id FROM orders) SELECT id FROM recent UNION ALL SELECT id FROM archive.orders"
        );
        assert_eq!(
            render("(select id from a limit 1) union select id from b order by id"),
            "(SELECT id FROM a LIMIT 1) UNION SELECT id FROM b ORDER BY id"
        );
    }

    #[test]
    fn subqueries_in_expressions_drop_alias_keyword() {
        assert_eq!(
            render("select c.name from customers as c where exists (select 1 from orders as o where o.customer_id = c.id)"),
            "SELECT c.name FROM customers c WHERE EXISTS (SELECT 1 FROM orders o WHERE o.customer_id = c.id)"
        );
        assert_eq!(
            render("select o.id, (select max(l.qty) from lines as l where l.order_id = o.id) as top from orders o"),
            "SELECT o.id, (SELECT max(l.qty) FROM lines l WHERE l.order_id = o.id) AS top FROM orders o"
        );
    }

    #[test]
    fn derived_tables_and_distinct_on() {
        assert_eq!(
            render("select distinct on (t.customer_id) t.customer_id from (select customer_id from orders) t"),
            "SELECT DISTINCT ON (t.customer_id) t.customer_id FROM (SELECT customer_id FROM orders) t"
        );
    }
}
