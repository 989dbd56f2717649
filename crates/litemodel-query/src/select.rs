//! SELECT builder, prepared selects, and row iteration.

use std::marker::PhantomData;

use litemodel_core::{
    ColumnRef, Connection, Error, Field, ForeignKeyGraph, InternalErrorKind, PreparedStatement,
    Result, RowCursor, Table, TableInfo, Value,
};

use crate::clause::{
    Direction, GroupKey, Limit, OrderBy, Where, and_filter, write_from, write_group_by,
};
use crate::expr::Expr;
use crate::join::{Join, JoinKind, resolve_joins};
use crate::selection::{Layout, SelectItem, SelectList};

/// A SELECT under construction.
///
/// ```ignore
/// let weak = Select::new(&conn, count(Student::ID))
///     .filter(Student::GPA.lt(3.0))
///     .one()?;
/// ```
pub struct Select<'c, C: Connection, S: SelectList> {
    conn: &'c C,
    graph: Option<&'c ForeignKeyGraph>,
    selection: S,
    from: Option<&'static TableInfo>,
    joins: Vec<Join>,
    filter: Option<Where>,
    group_by: Option<Vec<ColumnRef>>,
    order_by: Option<OrderBy>,
    limit: Option<Limit>,
}

impl<'c, C: Connection, S: SelectList> Select<'c, C, S> {
    pub fn new(conn: &'c C, selection: S) -> Self {
        Self {
            conn,
            graph: None,
            selection,
            from: None,
            joins: Vec::new(),
            filter: None,
            group_by: None,
            order_by: None,
            limit: None,
        }
    }

    /// Foreign-key graph consulted when a join cannot be inferred, to suggest the missing
    /// table.
    pub fn with_graph(mut self, graph: &'c ForeignKeyGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Set the FROM table explicitly.
    pub fn from<T: Table>(mut self) -> Self {
        self.from = Some(T::info());
        self
    }

    /// INNER JOIN `T` on an inferred foreign key.
    pub fn join<T: Table>(self) -> Self {
        self.push_join(Join::new(JoinKind::Inner, T::info()))
    }

    pub fn left_join<T: Table>(self) -> Self {
        self.push_join(Join::new(JoinKind::Left, T::info()))
    }

    pub fn right_join<T: Table>(self) -> Self {
        self.push_join(Join::new(JoinKind::Right, T::info()))
    }

    pub fn full_join<T: Table>(self) -> Self {
        self.push_join(Join::new(JoinKind::Full, T::info()))
    }

    pub fn cross_join<T: Table>(self) -> Self {
        self.push_join(Join::new(JoinKind::Cross, T::info()))
    }

    /// Join `b`'s table with the explicit condition `a = b`.
    pub fn join_on<A: Table, B: Table, V>(
        self,
        kind: JoinKind,
        a: Field<A, V>,
        b: Field<B, V>,
    ) -> Self {
        self.push_join(Join::on(kind, B::info(), a.column(), b.column()))
    }

    fn push_join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Add a WHERE condition, AND-combined with earlier ones.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(and_filter(self.filter.take(), expr));
        self
    }

    /// GROUP BY a column, or by a table's primary key with `all::<T>()`.
    pub fn group_by(mut self, key: impl GroupKey) -> Self {
        if self.group_by.is_some() {
            tracing::warn!("group_by already set; ignoring repeated call");
        } else {
            self.group_by = Some(key.group_columns());
        }
        self
    }

    pub fn order_by<T, V>(mut self, field: Field<T, V>, direction: Direction) -> Self {
        if self.order_by.is_some() {
            tracing::warn!("order_by already set; ignoring repeated call");
        } else {
            self.order_by = Some(OrderBy::new(field.column(), direction));
        }
        self
    }

    pub fn limit(self, count: u64) -> Self {
        self.set_limit(Limit {
            count,
            offset: None,
        })
    }

    pub fn limit_offset(self, count: u64, offset: u64) -> Self {
        self.set_limit(Limit {
            count,
            offset: Some(offset),
        })
    }

    fn set_limit(mut self, limit: Limit) -> Self {
        if self.limit.is_some() {
            tracing::warn!("limit already set; ignoring repeated call");
        } else {
            self.limit = Some(limit);
        }
        self
    }

    /// Render the SQL and return it with the WHERE bindings, without preparing.
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let plan = self.plan()?;
        Ok((plan.sql, plan.bindings))
    }

    fn plan(&self) -> Result<Plan> {
        let items = self.selection.items();
        let from = self
            .from
            .or_else(|| items.iter().find_map(|item| item.table))
            .ok_or_else(|| {
                Error::internal(
                    InternalErrorKind::InvalidQuery,
                    "no FROM table: select a table column or call from::<T>()",
                )
            })?;

        let joins = resolve_joins(from, &self.joins, self.graph)?;

        for item in &items {
            if let Some(table) = item.table {
                if !joins.contains(table.name) {
                    return Err(Error::internal(
                        InternalErrorKind::UnresolvedReference,
                        format!("`{}` is selected but not joined", table.name),
                    ));
                }
            }
        }
        if let Some(filter) = &self.filter {
            if let Some(table) = filter.expr().tables().into_iter().find(|t| !joins.contains(t)) {
                return Err(Error::internal(
                    InternalErrorKind::UnresolvedReference,
                    format!("filter references `{table}`, which is not joined"),
                ));
            }
        }

        let mut sql = String::from("SELECT ");
        sql.push_str(&render_items(&items));
        write_from(from.name, &mut sql);
        for join in &joins.joins {
            join.write_sql(&mut sql);
        }
        if let Some(filter) = &self.filter {
            filter.write_sql(&mut sql);
        }
        if let Some(columns) = &self.group_by {
            write_group_by(columns, &mut sql);
        }
        if let Some(order_by) = &self.order_by {
            order_by.write_sql(&mut sql);
        }
        if let Some(limit) = &self.limit {
            limit.write_sql(&mut sql);
        }

        Ok(Plan {
            sql,
            bindings: self.filter.as_ref().map(|f| f.expr().bindings()).unwrap_or_default(),
            filter_sql: self.filter.as_ref().map(|f| f.expr().serialize()),
            layout: Layout::new(&items, &joins.nullable),
        })
    }

    /// Compile the query and bind its filter values.
    pub fn prepare(self) -> Result<PreparedSelect<'c, C, S>> {
        let plan = self.plan()?;
        tracing::debug!(sql = %plan.sql, bindings = plan.bindings.len(), "Preparing select");

        let mut stmt = self.conn.prepare(&plan.sql)?;
        if stmt.column_count() != plan.layout.width {
            return Err(Error::internal(
                InternalErrorKind::LayoutMismatch,
                format!(
                    "statement returns {} columns but the selection reads {}: {}",
                    stmt.column_count(),
                    plan.layout.width,
                    plan.sql
                ),
            ));
        }
        stmt.bind(&plan.bindings)?;

        Ok(PreparedSelect {
            stmt,
            selection: self.selection,
            layout: plan.layout,
            filter_sql: plan.filter_sql,
            bindings: plan.bindings,
            _conn: PhantomData,
        })
    }

    /// Prepare and collect every row.
    pub fn all(self) -> Result<Vec<S::Row>> {
        self.prepare()?.all()
    }

    pub fn first(self) -> Result<Option<S::Row>> {
        self.prepare()?.first()
    }

    pub fn one(self) -> Result<S::Row> {
        self.prepare()?.one()
    }

    pub fn one_or_none(self) -> Result<Option<S::Row>> {
        self.prepare()?.one_or_none()
    }
}

struct Plan {
    sql: String,
    bindings: Vec<Value>,
    filter_sql: Option<String>,
    layout: Layout,
}

fn render_items(items: &[SelectItem]) -> String {
    items
        .iter()
        .map(|item| item.sql.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A compiled SELECT that can be run repeatedly and rebound.
pub struct PreparedSelect<'c, C: Connection + 'c, S: SelectList> {
    stmt: C::Statement<'c>,
    selection: S,
    layout: Layout,
    filter_sql: Option<String>,
    bindings: Vec<Value>,
    _conn: PhantomData<&'c C>,
}

impl<'c, C: Connection + 'c, S: SelectList> PreparedSelect<'c, C, S> {
    pub fn sql(&self) -> &str {
        self.stmt.sql()
    }

    pub fn bindings(&self) -> &[Value] {
        &self.bindings
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Rewind and start a fresh pass over the results.
    pub fn iter(&mut self) -> Result<Rows<'_, C::Statement<'c>, S>> {
        self.stmt.rewind()?;
        let cursor = self.stmt.query()?;
        Ok(Rows {
            cursor,
            selection: &self.selection,
            layout: &self.layout,
            finished: false,
        })
    }

    pub fn all(&mut self) -> Result<Vec<S::Row>> {
        self.iter()?.collect()
    }

    pub fn first(&mut self) -> Result<Option<S::Row>> {
        self.iter()?.next().transpose()
    }

    /// The only row; fails on zero rows or more than one.
    pub fn one(&mut self) -> Result<S::Row> {
        let mut rows = self.iter()?;
        let Some(first) = rows.next().transpose()? else {
            return Err(Error::Custom("Expected exactly one row, found none".to_string()));
        };
        if rows.next().transpose()?.is_some() {
            return Err(Error::Custom(
                "Expected exactly one row, found more than one".to_string(),
            ));
        }
        Ok(first)
    }

    /// The only row if there is one; fails on more than one.
    pub fn one_or_none(&mut self) -> Result<Option<S::Row>> {
        let mut rows = self.iter()?;
        let first = rows.next().transpose()?;
        if first.is_some() && rows.next().transpose()?.is_some() {
            return Err(Error::Custom(
                "Expected zero or one row, found more than one".to_string(),
            ));
        }
        Ok(first)
    }

    /// Swap in new WHERE values without recompiling.
    ///
    /// `expr` must render to the same SQL as the filter the query was prepared with, so
    /// only the bound values differ.
    pub fn rebind(&mut self, expr: &Expr) -> Result<()> {
        let Some(filter_sql) = &self.filter_sql else {
            return Err(Error::internal(
                InternalErrorKind::InvalidQuery,
                "query was prepared without a filter; nothing to rebind",
            ));
        };
        let sql = expr.serialize();
        if &sql != filter_sql {
            return Err(Error::internal(
                InternalErrorKind::BindingMismatch,
                format!("rebind expects `{filter_sql}`, got `{sql}`"),
            ));
        }
        let bindings = expr.bindings();
        tracing::trace!(bindings = bindings.len(), "Rebinding select");
        self.stmt.bind(&bindings)?;
        self.bindings = bindings;
        Ok(())
    }
}

impl<C: Connection, S: SelectList> std::fmt::Debug for PreparedSelect<'_, C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedSelect")
            .field("sql", &self.stmt.sql())
            .field("bindings", &self.bindings)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

/// Lazy, single-pass iterator over a running select.
///
/// Each `next` steps the statement once. After the last row, or after an error, it yields
/// `None`.
pub struct Rows<'s, P: PreparedStatement + 's, S: SelectList> {
    cursor: P::Cursor<'s>,
    selection: &'s S,
    layout: &'s Layout,
    finished: bool,
}

impl<'s, P: PreparedStatement + 's, S: SelectList> Iterator for Rows<'s, P, S> {
    type Item = Result<S::Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.cursor.step() {
            Ok(Some(row)) => Some(self.selection.read_row(&row, self.layout)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use litemodel_macros::Table;
    use litemodel_sqlite::SqliteConnection;

    use super::*;
    use crate::expr::FieldExt;
    use crate::selection::{all, count, count_all};

    #[derive(Debug, Clone, PartialEq, Table)]
    struct Team {
        #[litemodel(primary_key, autoincrement)]
        id: i64,
        name: String,
    }

    #[derive(Debug, Clone, PartialEq, Table)]
    struct Hero {
        #[litemodel(primary_key, autoincrement)]
        id: i64,
        name: String,
        age: Option<i32>,
        #[litemodel(references(Team::ID))]
        team_id: Option<i64>,
    }

    #[derive(Debug, Table)]
    struct Power {
        #[litemodel(primary_key)]
        id: i64,
        name: String,
    }

    fn conn() -> SqliteConnection {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE teams (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL); \
             CREATE TABLE heros (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, \
                 age INTEGER, team_id INTEGER REFERENCES teams (id)); \
             CREATE TABLE powers (id INTEGER PRIMARY KEY, name TEXT NOT NULL); \
             INSERT INTO teams (name) VALUES ('Preventers'), ('Z-Force'); \
             INSERT INTO heros (name, age, team_id) VALUES \
                 ('Deadpond', NULL, 2), ('Spider-Boy', 16, NULL), ('Rusty-Man', 48, 1);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_sql_shape() {
        let conn = conn();
        let (sql, bindings) = Select::new(&conn, (all::<Hero>(), Team::NAME))
            .left_join::<Team>()
            .filter(Hero::AGE.gt(18))
            .filter(Team::NAME.like("P%"))
            .order_by(Hero::NAME, Direction::Desc)
            .limit_offset(5, 10)
            .build()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT `heros`.*, `teams`.`name` FROM `heros` \
             LEFT JOIN `teams` ON `heros`.`team_id` = `teams`.`id` \
             WHERE (`heros`.`age` > ? AND `teams`.`name` LIKE ?) \
             ORDER BY `heros`.`name` DESC LIMIT 5 OFFSET 10"
        );
        assert_eq!(bindings, vec![Value::BigInt(18), Value::from("P%")]);
    }

    #[test]
    fn test_repeated_clauses_keep_first() {
        let conn = conn();
        let (sql, _) = Select::new(&conn, Hero::NAME)
            .order_by(Hero::NAME, Direction::Asc)
            .order_by(Hero::AGE, Direction::Desc)
            .limit(1)
            .limit(50)
            .group_by(Hero::NAME)
            .group_by(Hero::AGE)
            .build()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT `heros`.`name` FROM `heros` GROUP BY `heros`.`name` \
             ORDER BY `heros`.`name` ASC LIMIT 1"
        );
    }

    #[test]
    fn test_left_join_rows() {
        let conn = conn();
        let rows = Select::new(&conn, (all::<Hero>(), all::<Team>()))
            .left_join::<Team>()
            .order_by(Hero::ID, Direction::Asc)
            .all()
            .unwrap();
        assert_eq!(rows.len(), 3);
        let (hero, team) = &rows[1];
        assert_eq!(hero.as_ref().unwrap().name, "Spider-Boy");
        assert!(team.is_none());
        assert_eq!(rows[0].1.as_ref().unwrap().name, "Z-Force");
    }

    #[test]
    fn test_count_and_group() {
        let conn = conn();
        let n = Select::new(&conn, count_all())
            .from::<Hero>()
            .filter(Hero::TEAM_ID.is_not_null())
            .one()
            .unwrap();
        assert_eq!(n, 2);

        let per_team = Select::new(&conn, (Team::NAME, count(Hero::ID)))
            .join::<Hero>()
            .from::<Team>()
            .group_by(all::<Team>())
            .order_by(Team::NAME, Direction::Asc)
            .all()
            .unwrap();
        assert_eq!(
            per_team,
            vec![
                (Some("Preventers".to_string()), Some(1)),
                (Some("Z-Force".to_string()), Some(1)),
            ]
        );
    }

    #[test]
    fn test_iter_restarts_and_rebind() {
        let conn = conn();
        let mut prepared = Select::new(&conn, Hero::NAME)
            .filter(Hero::AGE.gt(10))
            .order_by(Hero::ID, Direction::Asc)
            .prepare()
            .unwrap();

        let first_pass: Vec<String> = prepared.iter().unwrap().map(Result::unwrap).collect();
        assert_eq!(first_pass, vec!["Spider-Boy", "Rusty-Man"]);
        assert_eq!(prepared.all().unwrap(), first_pass);

        prepared.rebind(&Hero::AGE.gt(20)).unwrap();
        assert_eq!(prepared.all().unwrap(), vec!["Rusty-Man"]);
        assert_eq!(prepared.bindings(), &[Value::BigInt(20)]);

        let err = prepared.rebind(&Hero::AGE.lt(20)).unwrap_err();
        assert_eq!(err.internal_kind(), Some(InternalErrorKind::BindingMismatch));
    }

    #[test]
    fn test_row_count_expectations() {
        let conn = conn();
        let err = Select::new(&conn, all::<Hero>()).one().unwrap_err();
        assert_eq!(err.to_string(), "Expected exactly one row, found more than one");

        let err = Select::new(&conn, all::<Hero>())
            .filter(Hero::NAME.eq("Nobody"))
            .one()
            .unwrap_err();
        assert_eq!(err.to_string(), "Expected exactly one row, found none");

        assert!(
            Select::new(&conn, all::<Hero>())
                .filter(Hero::NAME.eq("Nobody"))
                .one_or_none()
                .unwrap()
                .is_none()
        );
        let err = Select::new(&conn, all::<Hero>()).one_or_none().unwrap_err();
        assert!(matches!(err, Error::Custom(_)));

        let hero = Select::new(&conn, all::<Hero>())
            .order_by(Hero::AGE, Direction::Desc)
            .first()
            .unwrap()
            .unwrap();
        assert_eq!(hero.name, "Rusty-Man");
    }

    #[test]
    fn test_unjoined_selection_fails() {
        let conn = conn();
        let err = Select::new(&conn, (all::<Hero>(), all::<Team>()))
            .prepare()
            .unwrap_err();
        assert_eq!(err.internal_kind(), Some(InternalErrorKind::UnresolvedReference));

        let err = Select::new(&conn, count_all()).prepare().unwrap_err();
        assert_eq!(err.internal_kind(), Some(InternalErrorKind::InvalidQuery));

        let err = Select::new(&conn, all::<Hero>())
            .join::<Power>()
            .prepare()
            .unwrap_err();
        assert_eq!(err.internal_kind(), Some(InternalErrorKind::UnresolvedReference));
    }
}
