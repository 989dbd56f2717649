//! Filter expressions.
//!
//! An [`Expr`] is an immutable tree. Leaves compare a column with bound values (or with
//! another column); composites join two children with AND / OR. Every bound value renders
//! as a `?` placeholder, and [`Expr::bindings`] returns the values in placeholder order.

use std::fmt;
use std::ops::{BitAnd, BitOr};

use litemodel_core::{ColumnRef, Field, FieldType, Value};

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
    Glob,
    NotGlob,
}

impl CompareOp {
    pub const fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::NotLike => "NOT LIKE",
            CompareOp::Glob => "GLOB",
            CompareOp::NotGlob => "NOT GLOB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logical {
    And,
    Or,
}

impl Logical {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Logical::And => "AND",
            Logical::Or => "OR",
        }
    }
}

/// A filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `column <op> ?`
    Compare {
        column: ColumnRef,
        op: CompareOp,
        value: Value,
    },
    /// `column [NOT] IN (?, ?, ...)`
    In {
        column: ColumnRef,
        values: Vec<Value>,
        negated: bool,
    },
    /// `column IS [NOT] NULL`
    IsNull { column: ColumnRef, negated: bool },
    /// `left <op> right`, no bindings
    Columns {
        left: ColumnRef,
        op: CompareOp,
        right: ColumnRef,
    },
    /// `(lhs AND rhs)` / `(lhs OR rhs)`
    Logical {
        op: Logical,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn compare(column: ColumnRef, op: CompareOp, value: impl Into<Value>) -> Self {
        Expr::Compare {
            column,
            op,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn and(self, other: Expr) -> Self {
        Expr::Logical {
            op: Logical::And,
            lhs: Box::new(self),
            rhs: Box::new(other),
        }
    }

    #[must_use]
    pub fn or(self, other: Expr) -> Self {
        Expr::Logical {
            op: Logical::Or,
            lhs: Box::new(self),
            rhs: Box::new(other),
        }
    }

    /// SQL text with `?` placeholders.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_sql(&mut out);
        out
    }

    pub fn write_sql(&self, out: &mut String) {
        match self {
            Expr::Compare { column, op, .. } => {
                out.push_str(&column.qualified());
                out.push(' ');
                out.push_str(op.as_sql());
                out.push_str(" ?");
            }
            Expr::In {
                column,
                values,
                negated,
            } => {
                out.push_str(&column.qualified());
                out.push_str(if *negated { " NOT IN (" } else { " IN (" });
                for i in 0..values.len() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push('?');
                }
                out.push(')');
            }
            Expr::IsNull { column, negated } => {
                out.push_str(&column.qualified());
                out.push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Expr::Columns { left, op, right } => {
                out.push_str(&left.qualified());
                out.push(' ');
                out.push_str(op.as_sql());
                out.push(' ');
                out.push_str(&right.qualified());
            }
            Expr::Logical { op, lhs, rhs } => {
                out.push('(');
                lhs.write_sql(out);
                out.push(' ');
                out.push_str(op.as_sql());
                out.push(' ');
                rhs.write_sql(out);
                out.push(')');
            }
        }
    }

    /// Bound values, depth-first and left to right; value *i* binds placeholder *i*.
    pub fn bindings(&self) -> Vec<Value> {
        let mut out = Vec::with_capacity(self.placeholder_count());
        self.collect_bindings(&mut out);
        out
    }

    fn collect_bindings(&self, out: &mut Vec<Value>) {
        match self {
            Expr::Compare { value, .. } => out.push(value.clone()),
            Expr::In { values, .. } => out.extend(values.iter().cloned()),
            Expr::IsNull { .. } | Expr::Columns { .. } => {}
            Expr::Logical { lhs, rhs, .. } => {
                lhs.collect_bindings(out);
                rhs.collect_bindings(out);
            }
        }
    }

    pub fn placeholder_count(&self) -> usize {
        match self {
            Expr::Compare { .. } => 1,
            Expr::In { values, .. } => values.len(),
            Expr::IsNull { .. } | Expr::Columns { .. } => 0,
            Expr::Logical { lhs, rhs, .. } => lhs.placeholder_count() + rhs.placeholder_count(),
        }
    }

    /// Every table a column in this expression belongs to, in first-seen order.
    pub fn tables(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        self.collect_tables(&mut out);
        out
    }

    fn collect_tables(&self, out: &mut Vec<&'static str>) {
        fn push(out: &mut Vec<&'static str>, table: &'static str) {
            if !out.contains(&table) {
                out.push(table);
            }
        }
        match self {
            Expr::Compare { column, .. } | Expr::In { column, .. } | Expr::IsNull { column, .. } => {
                push(out, column.table);
            }
            Expr::Columns { left, right, .. } => {
                push(out, left.table);
                push(out, right.table);
            }
            Expr::Logical { lhs, rhs, .. } => {
                lhs.collect_tables(out);
                rhs.collect_tables(out);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl BitAnd for Expr {
    type Output = Expr;

    fn bitand(self, rhs: Expr) -> Expr {
        self.and(rhs)
    }
}

impl BitOr for Expr {
    type Output = Expr;

    fn bitor(self, rhs: Expr) -> Expr {
        self.or(rhs)
    }
}

/// Expression constructors on typed fields.
///
/// Values are converted through the column's Rust type, so `Student::GPA.lt(3)` binds a
/// REAL and `Student::NAME.eq(1)` does not compile.
pub trait FieldExt<V: FieldType>: Copy {
    fn column_ref(&self) -> ColumnRef;

    fn eq(self, value: impl Into<V>) -> Expr {
        self.compare(CompareOp::Eq, value)
    }

    fn ne(self, value: impl Into<V>) -> Expr {
        self.compare(CompareOp::Ne, value)
    }

    fn lt(self, value: impl Into<V>) -> Expr {
        self.compare(CompareOp::Lt, value)
    }

    fn le(self, value: impl Into<V>) -> Expr {
        self.compare(CompareOp::Le, value)
    }

    fn gt(self, value: impl Into<V>) -> Expr {
        self.compare(CompareOp::Gt, value)
    }

    fn ge(self, value: impl Into<V>) -> Expr {
        self.compare(CompareOp::Ge, value)
    }

    fn compare(self, op: CompareOp, value: impl Into<V>) -> Expr {
        Expr::Compare {
            column: self.column_ref(),
            op,
            value: value.into().to_value(),
        }
    }

    fn like(self, pattern: impl Into<String>) -> Expr {
        Expr::compare(self.column_ref(), CompareOp::Like, pattern.into())
    }

    fn not_like(self, pattern: impl Into<String>) -> Expr {
        Expr::compare(self.column_ref(), CompareOp::NotLike, pattern.into())
    }

    fn glob(self, pattern: impl Into<String>) -> Expr {
        Expr::compare(self.column_ref(), CompareOp::Glob, pattern.into())
    }

    fn not_glob(self, pattern: impl Into<String>) -> Expr {
        Expr::compare(self.column_ref(), CompareOp::NotGlob, pattern.into())
    }

    fn is_in<I>(self, values: I) -> Expr
    where
        I: IntoIterator,
        I::Item: Into<V>,
    {
        Expr::In {
            column: self.column_ref(),
            values: values.into_iter().map(|v| v.into().to_value()).collect(),
            negated: false,
        }
    }

    fn not_in<I>(self, values: I) -> Expr
    where
        I: IntoIterator,
        I::Item: Into<V>,
    {
        Expr::In {
            column: self.column_ref(),
            values: values.into_iter().map(|v| v.into().to_value()).collect(),
            negated: true,
        }
    }

    fn is_null(self) -> Expr {
        Expr::IsNull {
            column: self.column_ref(),
            negated: false,
        }
    }

    fn is_not_null(self) -> Expr {
        Expr::IsNull {
            column: self.column_ref(),
            negated: true,
        }
    }

    /// `self = other`, typically across a join.
    fn eq_field<U>(self, other: Field<U, V>) -> Expr {
        self.compare_field(CompareOp::Eq, other)
    }

    fn compare_field<U>(self, op: CompareOp, other: Field<U, V>) -> Expr {
        Expr::Columns {
            left: self.column_ref(),
            op,
            right: other.column(),
        }
    }
}

impl<T, V: FieldType> FieldExt<V> for Field<T, V> {
    fn column_ref(&self) -> ColumnRef {
        self.column()
    }
}
