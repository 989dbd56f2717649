//! SQL clause types: WHERE, GROUP BY, ORDER BY, LIMIT.

use litemodel_core::{ColumnRef, Field, Table, quote_ident};

use crate::expr::Expr;
use crate::selection::All;

/// WHERE clause. Successive filters are AND-combined.
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    expr: Expr,
}

impl Where {
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }

    /// AND `expr` onto the existing condition.
    #[must_use]
    pub fn and(self, expr: Expr) -> Self {
        Self {
            expr: self.expr.and(expr),
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn into_expr(self) -> Expr {
        self.expr
    }

    pub fn write_sql(&self, out: &mut String) {
        out.push_str(" WHERE ");
        self.expr.write_sql(out);
    }
}

/// Combine an optional filter with another expression.
pub(crate) fn and_filter(filter: Option<Where>, expr: Expr) -> Where {
    match filter {
        Some(existing) => existing.and(expr),
        None => Where::new(expr),
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// ORDER BY a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub direction: Direction,
}

impl OrderBy {
    pub fn new(column: ColumnRef, direction: Direction) -> Self {
        Self { column, direction }
    }

    pub fn write_sql(&self, out: &mut String) {
        out.push_str(" ORDER BY ");
        out.push_str(&self.column.qualified());
        out.push(' ');
        out.push_str(self.direction.as_sql());
    }
}

/// LIMIT with optional OFFSET, rendered as literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub count: u64,
    pub offset: Option<u64>,
}

impl Limit {
    pub fn write_sql(&self, out: &mut String) {
        out.push_str(&format!(" LIMIT {}", self.count));
        if let Some(offset) = self.offset {
            out.push_str(&format!(" OFFSET {offset}"));
        }
    }
}

/// Something a query can be grouped by.
pub trait GroupKey {
    fn group_columns(&self) -> Vec<ColumnRef>;
}

impl<T, V> GroupKey for Field<T, V> {
    fn group_columns(&self) -> Vec<ColumnRef> {
        vec![self.column()]
    }
}

/// A whole table groups by its primary key, or by every column when it has none.
impl<T: Table> GroupKey for All<T> {
    fn group_columns(&self) -> Vec<ColumnRef> {
        let info = T::info();
        match info.primary_key() {
            Some((_, pk)) => vec![ColumnRef::new(info.name, pk.name)],
            None => info
                .column_names()
                .map(|name| ColumnRef::new(info.name, name))
                .collect(),
        }
    }
}

pub(crate) fn write_group_by(columns: &[ColumnRef], out: &mut String) {
    out.push_str(" GROUP BY ");
    let rendered: Vec<String> = columns.iter().map(ColumnRef::qualified).collect();
    out.push_str(&rendered.join(", "));
}

pub(crate) fn write_from(table: &str, out: &mut String) {
    out.push_str(" FROM ");
    out.push_str(&quote_ident(table));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::FieldExt;

    struct Student;

    const YEAR: Field<Student, i32> = Field::new("students", "year", 2);
    const GPA: Field<Student, f64> = Field::new("students", "gpa", 3);

    #[test]
    fn test_where_and_combines() {
        let clause = and_filter(None, YEAR.eq(2));
        let clause = and_filter(Some(clause), GPA.lt(3.0));
        let mut sql = String::new();
        clause.write_sql(&mut sql);
        assert_eq!(
            sql,
            " WHERE (`students`.`year` = ? AND `students`.`gpa` < ?)"
        );
        assert_eq!(clause.expr().placeholder_count(), 2);
    }

    #[test]
    fn test_order_limit_group() {
        let mut sql = String::new();
        write_group_by(&YEAR.group_columns(), &mut sql);
        OrderBy::new(GPA.column(), Direction::Desc).write_sql(&mut sql);
        Limit {
            count: 10,
            offset: Some(20),
        }
        .write_sql(&mut sql);
        assert_eq!(
            sql,
            " GROUP BY `students`.`year` ORDER BY `students`.`gpa` DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(Direction::default(), Direction::Asc);
    }
}
