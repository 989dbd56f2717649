//! Column metadata and typed field handles.

use std::fmt;
use std::marker::PhantomData;

use crate::types::SqlType;

/// Referential action for foreign key constraints (ON DELETE / ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferentialAction {
    /// Raise an error if referencing rows exist when the statement completes.
    #[default]
    NoAction,
    /// Raise an error immediately.
    Restrict,
    /// Set referencing columns to NULL.
    SetNull,
    /// Set referencing columns to their DEFAULT.
    SetDefault,
    /// Delete or update the referencing rows as well.
    Cascade,
}

impl ReferentialAction {
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::Cascade => "CASCADE",
        }
    }

    /// Parse an action name (case-insensitive, spaces or underscores).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().replace('_', " ").as_str() {
            "NO ACTION" | "NOACTION" => Some(ReferentialAction::NoAction),
            "RESTRICT" => Some(ReferentialAction::Restrict),
            "SET NULL" | "SETNULL" => Some(ReferentialAction::SetNull),
            "SET DEFAULT" | "SETDEFAULT" => Some(ReferentialAction::SetDefault),
            "CASCADE" => Some(ReferentialAction::Cascade),
            _ => None,
        }
    }
}

/// Conflict resolution algorithm attached to a column constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictClause {
    Rollback,
    Abort,
    Fail,
    Ignore,
    Replace,
}

impl ConflictClause {
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            ConflictClause::Rollback => "ROLLBACK",
            ConflictClause::Abort => "ABORT",
            ConflictClause::Fail => "FAIL",
            ConflictClause::Ignore => "IGNORE",
            ConflictClause::Replace => "REPLACE",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ROLLBACK" => Some(ConflictClause::Rollback),
            "ABORT" => Some(ConflictClause::Abort),
            "FAIL" => Some(ConflictClause::Fail),
            "IGNORE" => Some(ConflictClause::Ignore),
            "REPLACE" => Some(ConflictClause::Replace),
            _ => None,
        }
    }
}

/// Built-in collating sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collation {
    Binary,
    NoCase,
    RTrim,
}

impl Collation {
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Collation::Binary => "BINARY",
            Collation::NoCase => "NOCASE",
            Collation::RTrim => "RTRIM",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "BINARY" => Some(Collation::Binary),
            "NOCASE" => Some(Collation::NoCase),
            "RTRIM" => Some(Collation::RTrim),
            _ => None,
        }
    }
}

/// A column-level foreign key: `REFERENCES table (column)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    /// Referenced table
    pub table: &'static str,
    /// Referenced column
    pub column: &'static str,
    pub on_update: Option<ReferentialAction>,
    pub on_delete: Option<ReferentialAction>,
}

impl ForeignKey {
    pub const fn new(table: &'static str, column: &'static str) -> Self {
        Self {
            table,
            column,
            on_update: None,
            on_delete: None,
        }
    }

    pub const fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }

    pub const fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }
}

/// One column constraint, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    NotNull {
        on_conflict: Option<ConflictClause>,
    },
    Unique {
        on_conflict: Option<ConflictClause>,
    },
    PrimaryKey {
        autoincrement: bool,
        on_conflict: Option<ConflictClause>,
    },
    /// `DEFAULT <expr>`; the expression is emitted verbatim
    Default(&'static str),
    Collate(Collation),
    ForeignKey(ForeignKey),
    /// `CHECK (<expr>)`
    Check(&'static str),
}

/// Metadata for one column of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: &'static str,
    pub sql_type: SqlType,
    /// True exactly when the field type is optional
    pub nullable: bool,
    pub constraints: &'static [Constraint],
}

impl ColumnInfo {
    pub const fn new(name: &'static str, sql_type: SqlType, nullable: bool) -> Self {
        Self {
            name,
            sql_type,
            nullable,
            constraints: &[],
        }
    }

    pub const fn constraints(mut self, constraints: &'static [Constraint]) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, Constraint::PrimaryKey { .. }))
    }

    pub fn is_autoincrement(&self) -> bool {
        self.constraints.iter().any(|c| {
            matches!(
                c,
                Constraint::PrimaryKey {
                    autoincrement: true,
                    ..
                }
            )
        })
    }

    pub fn has_default(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, Constraint::Default(_)))
    }

    pub fn has_not_null(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, Constraint::NotNull { .. }))
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.constraints.iter().filter_map(|c| match c {
            Constraint::ForeignKey(fk) => Some(fk),
            _ => None,
        })
    }
}

/// Untyped reference to a column of a named table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: &'static str,
    pub name: &'static str,
}

impl ColumnRef {
    pub const fn new(table: &'static str, name: &'static str) -> Self {
        Self { table, name }
    }

    /// `` `table`.`col` ``
    pub fn qualified(&self) -> String {
        format!(
            "{}.{}",
            crate::identifiers::quote_ident(self.table),
            crate::identifiers::quote_ident(self.name)
        )
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.name)
    }
}

/// Typed handle to column `name` of table `T`, holding values of type `V`.
///
/// Generated by `#[derive(Table)]` as associated constants:
///
/// ```ignore
/// let expr = Student::GPA.lt(3.0);
/// ```
pub struct Field<T, V> {
    pub table: &'static str,
    pub name: &'static str,
    /// Position of the column in the table's declaration order
    pub index: usize,
    _marker: PhantomData<fn() -> (T, V)>,
}

impl<T, V> Field<T, V> {
    pub const fn new(table: &'static str, name: &'static str, index: usize) -> Self {
        Self {
            table,
            name,
            index,
            _marker: PhantomData,
        }
    }

    pub const fn column(&self) -> ColumnRef {
        ColumnRef::new(self.table, self.name)
    }
}

impl<T, V> Clone for Field<T, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, V> Copy for Field<T, V> {}

impl<T, V> fmt::Debug for Field<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("table", &self.table)
            .field("name", &self.name)
            .field("index", &self.index)
            .finish()
    }
}
