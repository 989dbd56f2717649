//! JOIN clauses and ON-condition inference from foreign keys.

use litemodel_core::{
    ColumnRef, Error, ForeignKeyGraph, InternalErrorKind, Result, TableInfo, quote_ident,
};

/// Types of SQL joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    pub const fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }

    /// Whether rows of the joined table may be missing.
    pub const fn nullable_right(self) -> bool {
        matches!(self, JoinKind::Left | JoinKind::Full)
    }

    /// Whether rows of the tables already in the query may be missing.
    pub const fn nullable_left(self) -> bool {
        matches!(self, JoinKind::Right | JoinKind::Full)
    }
}

/// How a join's ON condition is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinCondition {
    /// Look for a foreign key between the joined table and an earlier one
    Infer,
    /// `left = right`
    On(ColumnRef, ColumnRef),
    /// No condition (cross join)
    None,
}

/// A join as written on the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: &'static TableInfo,
    pub condition: JoinCondition,
}

impl Join {
    pub fn new(kind: JoinKind, table: &'static TableInfo) -> Self {
        let condition = if kind == JoinKind::Cross {
            JoinCondition::None
        } else {
            JoinCondition::Infer
        };
        Self {
            kind,
            table,
            condition,
        }
    }

    pub fn on(kind: JoinKind, table: &'static TableInfo, left: ColumnRef, right: ColumnRef) -> Self {
        Self {
            kind,
            table,
            condition: JoinCondition::On(left, right),
        }
    }
}

/// A join with its condition settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedJoin {
    pub kind: JoinKind,
    pub table: &'static TableInfo,
    pub on: Option<(ColumnRef, ColumnRef)>,
}

impl ResolvedJoin {
    pub fn write_sql(&self, out: &mut String) {
        out.push(' ');
        out.push_str(self.kind.as_sql());
        out.push(' ');
        out.push_str(&quote_ident(self.table.name));
        if let Some((left, right)) = self.on {
            out.push_str(" ON ");
            out.push_str(&left.qualified());
            out.push_str(" = ");
            out.push_str(&right.qualified());
        }
    }
}

/// Tables of a query after join resolution.
#[derive(Debug, Clone, Default)]
pub struct JoinPlan {
    pub joins: Vec<ResolvedJoin>,
    /// FROM table first, then each joined table
    pub tables: Vec<&'static TableInfo>,
    /// Tables on the nullable side of some outer join
    pub nullable: Vec<&'static str>,
}

impl JoinPlan {
    pub fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t.name == table)
    }
}

/// Settle every join condition and work out which tables may come back NULL.
///
/// Inferred conditions use a foreign key between the joined table and a table already in
/// the query, trying earlier tables first. When none exists, `hints` (usually the whole
/// schema's graph) is searched for a path so the error can name the missing table.
pub fn resolve_joins(
    from: &'static TableInfo,
    joins: &[Join],
    hints: Option<&ForeignKeyGraph>,
) -> Result<JoinPlan> {
    let local = ForeignKeyGraph::from_tables(
        std::iter::once(from).chain(joins.iter().map(|j| j.table)),
    );
    let mut plan = JoinPlan {
        joins: Vec::with_capacity(joins.len()),
        tables: vec![from],
        nullable: Vec::new(),
    };

    for join in joins {
        if plan.contains(join.table.name) {
            return Err(Error::internal(
                InternalErrorKind::InvalidQuery,
                format!("table `{}` appears in the query more than once", join.table.name),
            ));
        }

        let on = match join.condition {
            JoinCondition::None => None,
            JoinCondition::On(left, right) => Some((left, right)),
            JoinCondition::Infer => Some(infer_condition(&plan, join.table, &local, hints)?),
        };

        if join.kind.nullable_left() {
            for table in &plan.tables {
                mark_nullable(&mut plan.nullable, table.name);
            }
        }
        if join.kind.nullable_right() {
            mark_nullable(&mut plan.nullable, join.table.name);
        }

        plan.tables.push(join.table);
        plan.joins.push(ResolvedJoin {
            kind: join.kind,
            table: join.table,
            on,
        });
    }

    Ok(plan)
}

fn mark_nullable(nullable: &mut Vec<&'static str>, table: &'static str) {
    if !nullable.contains(&table) {
        nullable.push(table);
    }
}

fn infer_condition(
    plan: &JoinPlan,
    target: &'static TableInfo,
    local: &ForeignKeyGraph,
    hints: Option<&ForeignKeyGraph>,
) -> Result<(ColumnRef, ColumnRef)> {
    for known in &plan.tables {
        if let Some(link) = local.link(known.name, target.name) {
            tracing::trace!(
                left = %link.left,
                right = %link.right,
                "Inferred join condition"
            );
            return Ok((link.left, link.right));
        }
    }

    let graph = hints.unwrap_or(local);
    let via = plan
        .tables
        .iter()
        .filter_map(|known| graph.reachable(known.name, target.name))
        .filter(|path| path.len() > 2)
        .min_by_key(Vec::len)
        .map(|path| path[1]);

    let message = match via {
        Some(intermediate) => format!(
            "no foreign key links `{}` to the query; join `{}` first",
            target.name, intermediate
        ),
        None => format!(
            "no foreign key links `{}` to any of {}",
            target.name,
            plan.tables
                .iter()
                .map(|t| format!("`{}`", t.name))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    Err(Error::internal(InternalErrorKind::UnresolvedReference, message))
}

#[cfg(test)]
mod tests {
    use litemodel_core::{Table, TableInfo};
    use litemodel_macros::Table;

    use super::*;

    #[derive(Debug, Table)]
    struct Student {
        #[litemodel(primary_key, autoincrement)]
        id: i64,
        name: String,
    }

    #[derive(Debug, Table)]
    struct Course {
        #[litemodel(primary_key)]
        id: i64,
        title: String,
    }

    #[derive(Debug, Table)]
    struct Enrollment {
        #[litemodel(primary_key, autoincrement)]
        id: i64,
        #[litemodel(references(Student::ID))]
        student_id: i64,
        #[litemodel(references(Course::ID))]
        course_id: i64,
    }

    fn info<T: Table>() -> &'static TableInfo {
        T::info()
    }

    #[test]
    fn test_infer_from_either_side() {
        let plan = resolve_joins(
            info::<Student>(),
            &[
                Join::new(JoinKind::Inner, info::<Enrollment>()),
                Join::new(JoinKind::Inner, info::<Course>()),
            ],
            None,
        )
        .unwrap();

        let mut sql = String::new();
        for join in &plan.joins {
            join.write_sql(&mut sql);
        }
        assert_eq!(
            sql,
            " INNER JOIN `enrollments` ON `students`.`id` = `enrollments`.`student_id` \
             INNER JOIN `courses` ON `enrollments`.`course_id` = `courses`.`id`"
        );
        assert!(plan.nullable.is_empty());
    }

    #[test]
    fn test_nullability_by_kind() {
        let plan = resolve_joins(
            info::<Student>(),
            &[Join::new(JoinKind::Left, info::<Enrollment>())],
            None,
        )
        .unwrap();
        assert_eq!(plan.nullable, vec!["enrollments"]);

        let plan = resolve_joins(
            info::<Student>(),
            &[
                Join::new(JoinKind::Inner, info::<Enrollment>()),
                Join::new(JoinKind::Right, info::<Course>()),
            ],
            None,
        )
        .unwrap();
        assert_eq!(plan.nullable, vec!["students", "enrollments"]);

        let plan = resolve_joins(
            info::<Student>(),
            &[Join::new(JoinKind::Full, info::<Enrollment>())],
            None,
        )
        .unwrap();
        assert_eq!(plan.nullable, vec!["students", "enrollments"]);

        let plan = resolve_joins(
            info::<Student>(),
            &[Join::new(JoinKind::Cross, info::<Course>())],
            None,
        )
        .unwrap();
        assert!(plan.joins[0].on.is_none());
        assert!(plan.nullable.is_empty());
    }

    #[test]
    fn test_unlinked_join_names_intermediate() {
        let hints = ForeignKeyGraph::from_tables([
            info::<Student>(),
            info::<Course>(),
            info::<Enrollment>(),
        ]);
        let err = resolve_joins(
            info::<Student>(),
            &[Join::new(JoinKind::Inner, info::<Course>())],
            Some(&hints),
        )
        .unwrap_err();
        assert_eq!(err.internal_kind(), Some(InternalErrorKind::UnresolvedReference));
        assert!(err.to_string().contains("join `enrollments` first"), "{err}");

        let err = resolve_joins(
            info::<Student>(),
            &[Join::new(JoinKind::Inner, info::<Course>())],
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("`students`"), "{err}");
    }

    #[test]
    fn test_explicit_condition_and_duplicates() {
        let plan = resolve_joins(
            info::<Student>(),
            &[Join::on(
                JoinKind::Inner,
                info::<Course>(),
                Student::ID.column(),
                Course::ID.column(),
            )],
            None,
        )
        .unwrap();
        assert_eq!(
            plan.joins[0].on,
            Some((Student::ID.column(), Course::ID.column()))
        );

        let err = resolve_joins(
            info::<Student>(),
            &[Join::new(JoinKind::Inner, info::<Student>())],
            None,
        )
        .unwrap_err();
        assert_eq!(err.internal_kind(), Some(InternalErrorKind::InvalidQuery));
    }
}
