//! CREATE / DROP TABLE rendering.

use litemodel_core::{ColumnInfo, ConflictClause, Constraint, SqlType, TableInfo, quote_ident};

/// `CREATE TABLE [IF NOT EXISTS] `name` (defs)`, one definition per column in order.
pub fn create_table_sql(info: &TableInfo, if_not_exists: bool) -> String {
    let defs: Vec<String> = info.columns.iter().map(column_definition).collect();
    let sql = format!(
        "CREATE TABLE {}{} ({})",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        quote_ident(info.name),
        defs.join(", ")
    );
    tracing::debug!(table = info.name, sql = %sql, "Generated CREATE TABLE");
    sql
}

/// `DROP TABLE [IF EXISTS] `name``
pub fn drop_table_sql(name: &str, if_exists: bool) -> String {
    format!(
        "DROP TABLE {}{}",
        if if_exists { "IF EXISTS " } else { "" },
        quote_ident(name)
    )
}

/// Remove every row while keeping the table.
pub fn truncate_sql(name: &str) -> String {
    format!("DELETE FROM {}", quote_ident(name))
}

/// `` `col` TYPE <declared constraints> [injected constraint] ``
pub fn column_definition(column: &ColumnInfo) -> String {
    let mut def = format!("{} {}", quote_ident(column.name), column.sql_type.sql_name());
    for constraint in column.constraints {
        def.push(' ');
        def.push_str(&constraint_sql(constraint));
    }
    if let Some(injected) = injected_constraint(column) {
        def.push(' ');
        def.push_str(injected);
    }
    def
}

/// The constraint added for a non-optional column that did not declare one.
///
/// Text columns default to the empty string, columns with a DEFAULT are left alone, and
/// everything else becomes NOT NULL. Auto-increment keys are assigned by the engine.
fn injected_constraint(column: &ColumnInfo) -> Option<&'static str> {
    if column.nullable || column.is_autoincrement() {
        return None;
    }
    let has_default = column.has_default();
    let has_not_null = column.has_not_null();
    if column.sql_type == SqlType::Text && !has_default && !has_not_null {
        Some("DEFAULT ''")
    } else if has_default || has_not_null {
        None
    } else {
        Some("NOT NULL")
    }
}

fn constraint_sql(constraint: &Constraint) -> String {
    match constraint {
        Constraint::NotNull { on_conflict } => with_conflict("NOT NULL", *on_conflict),
        Constraint::Unique { on_conflict } => with_conflict("UNIQUE", *on_conflict),
        Constraint::PrimaryKey {
            autoincrement,
            on_conflict,
        } => {
            let mut sql = with_conflict("PRIMARY KEY", *on_conflict);
            if *autoincrement {
                sql.push_str(" AUTOINCREMENT");
            }
            sql
        }
        Constraint::Default(expr) => format!("DEFAULT {expr}"),
        Constraint::Collate(collation) => format!("COLLATE {}", collation.as_sql()),
        Constraint::Check(expr) => format!("CHECK ({expr})"),
        Constraint::ForeignKey(fk) => {
            let mut sql = format!(
                "REFERENCES {} ({})",
                quote_ident(fk.table),
                quote_ident(fk.column)
            );
            if let Some(action) = fk.on_update {
                sql.push_str(" ON UPDATE ");
                sql.push_str(action.as_sql());
            }
            if let Some(action) = fk.on_delete {
                sql.push_str(" ON DELETE ");
                sql.push_str(action.as_sql());
            }
            sql
        }
    }
}

fn with_conflict(keyword: &str, clause: Option<ConflictClause>) -> String {
    match clause {
        Some(clause) => format!("{keyword} ON CONFLICT {}", clause.as_sql()),
        None => keyword.to_string(),
    }
}
