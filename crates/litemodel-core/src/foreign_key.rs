//! Graph of foreign-key edges between tables.
//!
//! Built from static [`TableInfo`] descriptors. Schema validation uses it to make sure every
//! reference resolves, and the select builder uses it to infer join conditions.

use std::collections::{HashMap, VecDeque};

use crate::field::ColumnRef;
use crate::table::TableInfo;

/// One declared foreign key: `from.column REFERENCES to.column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: ColumnRef,
    pub to: ColumnRef,
}

/// A direct equi-join between two tables, oriented as asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// Column on the first table passed to [`ForeignKeyGraph::link`]
    pub left: ColumnRef,
    /// Column on the second table
    pub right: ColumnRef,
}

#[derive(Debug, Clone, Default)]
pub struct ForeignKeyGraph {
    tables: Vec<&'static TableInfo>,
    edges: Vec<Edge>,
}

impl ForeignKeyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables<I>(tables: I) -> Self
    where
        I: IntoIterator<Item = &'static TableInfo>,
    {
        let mut graph = Self::new();
        for table in tables {
            graph.add_table(table);
        }
        graph
    }

    /// Add a node and its outgoing edges. Adding the same table twice is a no-op.
    pub fn add_table(&mut self, table: &'static TableInfo) {
        if self.contains(table.name) {
            return;
        }
        for (column, fk) in table.foreign_keys() {
            self.edges.push(Edge {
                from: ColumnRef::new(table.name, column.name),
                to: ColumnRef::new(fk.table, fk.column),
            });
        }
        self.tables.push(table);
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t.name == table)
    }

    pub fn table(&self, name: &str) -> Option<&'static TableInfo> {
        self.tables.iter().copied().find(|t| t.name == name)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Direct edge between `a` and `b` in either direction.
    pub fn link(&self, a: &str, b: &str) -> Option<Link> {
        self.edges.iter().find_map(|e| {
            if e.from.table == a && e.to.table == b {
                Some(Link {
                    left: e.from,
                    right: e.to,
                })
            } else if e.from.table == b && e.to.table == a {
                Some(Link {
                    left: e.to,
                    right: e.from,
                })
            } else {
                None
            }
        })
    }

    /// Shortest chain of table names from `a` to `b`, following edges in either direction.
    pub fn reachable(&self, a: &str, b: &str) -> Option<Vec<&'static str>> {
        let start = self.table(a)?.name;
        let goal = self.table(b)?.name;
        if start == goal {
            return Some(vec![start]);
        }

        let mut previous: HashMap<&'static str, &'static str> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for next in self.neighbours(current) {
                if next == start || previous.contains_key(next) {
                    continue;
                }
                previous.insert(next, current);
                if next == goal {
                    let mut path = vec![goal];
                    let mut cursor = goal;
                    while let Some(&p) = previous.get(cursor) {
                        path.push(p);
                        cursor = p;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// Edges whose target table or column is not part of the graph.
    pub fn unresolved(&self) -> Vec<Edge> {
        self.edges
            .iter()
            .filter(|e| {
                self.table(e.to.table)
                    .is_none_or(|t| t.column(e.to.name).is_none())
            })
            .copied()
            .collect()
    }

    fn neighbours<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'static str> + 'a {
        self.edges.iter().filter_map(move |e| {
            if e.from.table == table {
                self.table(e.to.table).map(|t| t.name)
            } else if e.to.table == table {
                self.table(e.from.table).map(|t| t.name)
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{ColumnInfo, Constraint, ForeignKey};
    use crate::types::SqlType;

    const PK: &[Constraint] = &[Constraint::PrimaryKey {
        autoincrement: true,
        on_conflict: None,
    }];

    const fn id() -> ColumnInfo {
        ColumnInfo {
            name: "id",
            sql_type: SqlType::Integer,
            nullable: false,
            constraints: PK,
        }
    }

    static STUDENTS: TableInfo = TableInfo {
        name: "students",
        columns: &[id()],
    };
    static COURSES: TableInfo = TableInfo {
        name: "courses",
        columns: &[id()],
    };
    static ENROLLMENTS: TableInfo = TableInfo {
        name: "enrollments",
        columns: &[
            id(),
            ColumnInfo {
                name: "student_id",
                sql_type: SqlType::Integer,
                nullable: false,
                constraints: &[Constraint::ForeignKey(ForeignKey {
                    table: "students",
                    column: "id",
                    on_update: None,
                    on_delete: None,
                })],
            },
            ColumnInfo {
                name: "course_id",
                sql_type: SqlType::Integer,
                nullable: false,
                constraints: &[Constraint::ForeignKey(ForeignKey {
                    table: "courses",
                    column: "id",
                    on_update: None,
                    on_delete: None,
                })],
            },
        ],
    };
    static DANGLING: TableInfo = TableInfo {
        name: "dangling",
        columns: &[ColumnInfo {
            name: "owner",
            sql_type: SqlType::Integer,
            nullable: true,
            constraints: &[Constraint::ForeignKey(ForeignKey {
                table: "students",
                column: "uuid",
                on_update: None,
                on_delete: None,
            })],
        }],
    };

    fn graph() -> ForeignKeyGraph {
        ForeignKeyGraph::from_tables([&STUDENTS, &COURSES, &ENROLLMENTS])
    }

    #[test]
    fn test_link_either_direction() {
        let g = graph();
        let link = g.link("students", "enrollments").unwrap();
        assert_eq!(link.left, ColumnRef::new("students", "id"));
        assert_eq!(link.right, ColumnRef::new("enrollments", "student_id"));

        let link = g.link("enrollments", "courses").unwrap();
        assert_eq!(link.left, ColumnRef::new("enrollments", "course_id"));
        assert_eq!(link.right, ColumnRef::new("courses", "id"));

        assert!(g.link("students", "courses").is_none());
    }

    #[test]
    fn test_reachable_through_intermediate() {
        let g = graph();
        assert_eq!(
            g.reachable("students", "courses"),
            Some(vec!["students", "enrollments", "courses"])
        );
        assert_eq!(g.reachable("students", "students"), Some(vec!["students"]));
        assert_eq!(g.reachable("students", "nowhere"), None);
    }

    #[test]
    fn test_unresolved_edges() {
        assert!(graph().unresolved().is_empty());

        let g = ForeignKeyGraph::from_tables([&STUDENTS, &DANGLING]);
        let unresolved = g.unresolved();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].to, ColumnRef::new("students", "uuid"));

        let g = ForeignKeyGraph::from_tables([&ENROLLMENTS]);
        assert_eq!(g.unresolved().len(), 2);
    }

    #[test]
    fn test_duplicate_tables_ignored() {
        let mut g = graph();
        g.add_table(&ENROLLMENTS);
        assert_eq!(g.edges().len(), 2);
    }
}
