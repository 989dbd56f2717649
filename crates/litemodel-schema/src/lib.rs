//! Table DDL and the schema registry for litemodel.
//!
//! `litemodel-schema` turns static `TableInfo` descriptors into CREATE TABLE statements and
//! keeps the ordered set of tables an application works with.
//!
//! # Role In The Architecture
//!
//! - **DDL**: [`create_table_sql`] renders one table, columns and constraints in declaration
//!   order.
//! - **Registry**: [`Schema`] collects tables in declaration order, checks that every foreign
//!   key resolves, and exposes the [`ForeignKeyGraph`] the query builder uses for joins.

pub mod ddl;

use litemodel_core::{Error, ForeignKeyGraph, InternalErrorKind, Result, Table, TableInfo};

pub use ddl::{column_definition, create_table_sql, drop_table_sql, truncate_sql};

/// Ordered set of tables.
///
/// ```ignore
/// let schema = Schema::new().table::<Student>().table::<Enrollment>();
/// schema.validate()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: Vec<&'static TableInfo>,
    graph: ForeignKeyGraph,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` after every table registered so far.
    pub fn table<T: Table>(self) -> Self {
        self.with_info(T::info())
    }

    /// Register a descriptor directly.
    pub fn with_info(mut self, info: &'static TableInfo) -> Self {
        self.graph.add_table(info);
        self.tables.push(info);
        self
    }

    /// Registered tables, in registration order.
    pub fn tables(&self) -> &[&'static TableInfo] {
        &self.tables
    }

    pub fn get(&self, name: &str) -> Option<&'static TableInfo> {
        self.graph.table(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.graph.contains(name)
    }

    pub fn graph(&self) -> &ForeignKeyGraph {
        &self.graph
    }

    /// Check that table names are unique and every foreign key points at a registered
    /// table and column.
    pub fn validate(&self) -> Result<()> {
        for (i, table) in self.tables.iter().enumerate() {
            if self.tables[..i].iter().any(|t| t.name == table.name) {
                return Err(Error::internal(
                    InternalErrorKind::InvalidQuery,
                    format!("table `{}` is registered more than once", table.name),
                ));
            }
        }

        if let Some(edge) = self.graph.unresolved().first() {
            return Err(Error::internal(
                InternalErrorKind::UnresolvedReference,
                format!(
                    "foreign key {} references {}, which is not in the schema",
                    edge.from, edge.to
                ),
            ));
        }

        tracing::debug!(tables = self.tables.len(), "Schema validated");
        Ok(())
    }

    /// CREATE TABLE statements for every table, in registration order.
    pub fn create_statements(&self, if_not_exists: bool) -> Vec<String> {
        self.tables
            .iter()
            .map(|t| create_table_sql(t, if_not_exists))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use litemodel_macros::Table;

    #[derive(Debug, Table)]
    struct Team {
        #[litemodel(primary_key, autoincrement)]
        id: i64,
        name: String,
    }

    #[derive(Debug, Table)]
    struct Hero {
        #[litemodel(primary_key, autoincrement)]
        id: i64,
        #[litemodel(references(Team::ID, on_delete = "set_null"))]
        team_id: Option<i64>,
    }

    #[test]
    fn test_statements_in_registration_order() {
        let schema = Schema::new().table::<Team>().table::<Hero>();
        schema.validate().unwrap();

        let statements = schema.create_statements(true);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS `teams`"));
        assert!(statements[1].starts_with("CREATE TABLE IF NOT EXISTS `heros`"));
        assert!(statements[1].contains("REFERENCES `teams` (`id`) ON DELETE SET NULL"));
        assert!(schema.contains("teams"));
        assert_eq!(schema.get("heros").map(|t| t.width()), Some(2));
    }

    #[test]
    fn test_unresolved_foreign_key() {
        let err = Schema::new().table::<Hero>().validate().unwrap_err();
        assert_eq!(err.internal_kind(), Some(InternalErrorKind::UnresolvedReference));
        assert!(err.to_string().contains("heros.team_id"));
    }

    #[test]
    fn test_duplicate_table() {
        let err = Schema::new()
            .table::<Team>()
            .table::<Team>()
            .validate()
            .unwrap_err();
        assert_eq!(err.internal_kind(), Some(InternalErrorKind::InvalidQuery));
    }
}
