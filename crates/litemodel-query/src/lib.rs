//! Type-safe query builder for litemodel.
//!
//! `litemodel-query` turns typed fields and expressions into SQL plus bound values, runs
//! them through any `litemodel_core::Connection`, and maps result rows back onto records.
//!
//! # Role In The Architecture
//!
//! - **Expressions**: [`FieldExt`] builds [`Expr`] trees from generated `Field` constants.
//! - **Selects**: [`Select`] assembles FROM, joins (inferred from foreign keys), WHERE,
//!   GROUP BY, ORDER BY and LIMIT. [`PreparedSelect`] runs and rebinds it, yielding typed
//!   rows through [`Rows`].
//! - **Writes**: [`InsertBuilder`], [`InsertManyBuilder`], [`UpdateBuilder`] and [`Delete`].

pub mod builder;
pub mod clause;
pub mod expr;
pub mod join;
pub mod select;
pub mod selection;

pub use builder::{Delete, InsertBuilder, InsertManyBuilder, PreparedDelete, UpdateBuilder};
pub use clause::{Direction, GroupKey, Limit, OrderBy, Where};
pub use expr::{CompareOp, Expr, FieldExt, Logical};
pub use join::{Join, JoinCondition, JoinKind, JoinPlan, ResolvedJoin, resolve_joins};
pub use select::{PreparedSelect, Rows, Select};
pub use selection::{
    All, Count, Layout, SelectItem, SelectList, Selection, all, count, count_all, count_distinct,
};
