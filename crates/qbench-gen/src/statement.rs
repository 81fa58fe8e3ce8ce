//! Statements of the engine's command language.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Physical layout of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Btree,
    Sorted,
}

impl IndexKind {
    pub fn token(self) -> &'static str {
        match self {
            IndexKind::Btree => "btree",
            IndexKind::Sorted => "sorted",
        }
    }
}

/// Whether the index order is the base column's storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clustering {
    Clustered,
    Unclustered,
}

impl Clustering {
    pub fn token(self) -> &'static str {
        match self {
            Clustering::Clustered => "clustered",
            Clustering::Unclustered => "unclustered",
        }
    }
}

/// Join operator selected by the last argument of `join(...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JoinStrategy {
    NestedLoop,
    Hash,
}

impl JoinStrategy {
    pub const ALL: [JoinStrategy; 2] = [JoinStrategy::NestedLoop, JoinStrategy::Hash];

    pub fn token(self) -> &'static str {
        match self {
            JoinStrategy::NestedLoop => "nested-loop",
            JoinStrategy::Hash => "hash",
        }
    }
}

/// One line of a command script.
///
/// Table and column references are fully qualified (`db1.tbl1.col1`); names
/// being created are bare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Statement {
    CreateDb {
        name: String,
    },
    CreateTable {
        name: String,
        database: String,
        columns: usize,
    },
    CreateColumn {
        name: String,
        table: String,
    },
    CreateIndex {
        column: String,
        kind: IndexKind,
        clustering: Clustering,
    },
    Load {
        path: String,
    },
    Select {
        handle: String,
        column: String,
        low: i64,
        high: i64,
    },
    Fetch {
        handle: String,
        column: String,
        positions: String,
    },
    Join {
        left: String,
        right: String,
        left_values: String,
        left_positions: String,
        right_values: String,
        right_positions: String,
        strategy: JoinStrategy,
    },
    RelationalInsert {
        table: String,
        values: Vec<i64>,
    },
    BatchQueries,
    BatchExecute,
    Shutdown,
}

impl Statement {
    /// Predicate bounds of a `select`, if this is one.
    pub fn select_range(&self) -> Option<(i64, i64)> {
        match self {
            Statement::Select { low, high, .. } => Some((*low, *high)),
            _ => None,
        }
    }

    pub fn is_batch_marker(&self) -> bool {
        matches!(self, Statement::BatchQueries | Statement::BatchExecute)
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::CreateDb { name } => write!(f, "create(db,\"{name}\")"),
            Statement::CreateTable {
                name,
                database,
                columns,
            } => write!(f, "create(tbl,\"{name}\",{database},{columns})"),
            Statement::CreateColumn { name, table } => write!(f, "create(col,\"{name}\",{table})"),
            Statement::CreateIndex {
                column,
                kind,
                clustering,
            } => write!(
                f,
                "create(idx,{column},{},{})",
                kind.token(),
                clustering.token()
            ),
            Statement::Load { path } => write!(f, "load(\"{path}\")"),
            Statement::Select {
                handle,
                column,
                low,
                high,
            } => write!(f, "{handle}=select({column},{low},{high})"),
            Statement::Fetch {
                handle,
                column,
                positions,
            } => write!(f, "{handle}=fetch({column},{positions})"),
            Statement::Join {
                left,
                right,
                left_values,
                left_positions,
                right_values,
                right_positions,
                strategy,
            } => write!(
                f,
                "{left},{right}=join({left_values},{left_positions},{right_values},{right_positions},{})",
                strategy.token()
            ),
            Statement::RelationalInsert { table, values } => {
                write!(f, "relational_insert({table}")?;
                for value in values {
                    write!(f, ",{value}")?;
                }
                write!(f, ")")
            }
            Statement::BatchQueries => f.write_str("batch_queries()"),
            Statement::BatchExecute => f.write_str("batch_execute()"),
            Statement::Shutdown => f.write_str("shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_command_language() {
        let cases = [
            (
                Statement::CreateDb { name: "db1".into() },
                "create(db,\"db1\")",
            ),
            (
                Statement::CreateTable {
                    name: "tbl1".into(),
                    database: "db1".into(),
                    columns: 2,
                },
                "create(tbl,\"tbl1\",db1,2)",
            ),
            (
                Statement::CreateColumn {
                    name: "col1".into(),
                    table: "db1.tbl1".into(),
                },
                "create(col,\"col1\",db1.tbl1)",
            ),
            (
                Statement::CreateIndex {
                    column: "db1.tbl1.col2".into(),
                    kind: IndexKind::Btree,
                    clustering: Clustering::Clustered,
                },
                "create(idx,db1.tbl1.col2,btree,clustered)",
            ),
            (
                Statement::Select {
                    handle: "s0".into(),
                    column: "db1.tbl1.col2".into(),
                    low: 10,
                    high: 20,
                },
                "s0=select(db1.tbl1.col2,10,20)",
            ),
            (
                Statement::Join {
                    left: "p10".into(),
                    right: "p20".into(),
                    left_values: "f1".into(),
                    left_positions: "s1".into(),
                    right_values: "f2".into(),
                    right_positions: "s2".into(),
                    strategy: JoinStrategy::NestedLoop,
                },
                "p10,p20=join(f1,s1,f2,s2,nested-loop)",
            ),
            (
                Statement::RelationalInsert {
                    table: "db1.tbl1".into(),
                    values: vec![3, 99],
                },
                "relational_insert(db1.tbl1,3,99)",
            ),
            (Statement::BatchQueries, "batch_queries()"),
        ];
        for (statement, expected) in cases {
            assert_eq!(statement.to_string(), expected);
        }
    }
}
