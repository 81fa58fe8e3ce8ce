//! Schema descriptions and the setup script built from them.

use std::collections::BTreeSet;

use qbench_core::errors::{BenchError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::script::CommandScript;
use crate::statement::{Clustering, IndexKind, Statement};

/// Index declared on one column of the benchmark table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Bare column name, e.g. `col2`.
    pub column: String,
    pub kind: IndexKind,
    pub clustering: Clustering,
}

impl IndexSpec {
    pub fn new(column: impl Into<String>, kind: IndexKind, clustering: Clustering) -> Self {
        Self {
            column: column.into(),
            kind,
            clustering,
        }
    }

    /// Short label such as `btree-clustered`.
    pub fn label(&self) -> String {
        format!("{}-{}", self.kind.token(), self.clustering.token())
    }
}

/// Single-table schema plus the data file loaded into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSpec {
    #[serde(default = "SchemaSpec::default_database")]
    pub database: String,
    pub table: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
    pub data_file: String,
}

impl SchemaSpec {
    fn default_database() -> String {
        "db1".to_string()
    }

    /// Two-column `tbl1` used by the selectivity, join and insert families.
    pub fn selectivity_table(data_file: impl Into<String>) -> Self {
        Self {
            database: Self::default_database(),
            table: "tbl1".to_string(),
            columns: vec!["col1".to_string(), "col2".to_string()],
            indexes: Vec::new(),
            data_file: data_file.into(),
        }
    }

    /// Four-column `tbl3_batch` used by the batched-scan families.
    pub fn batch_table(data_file: impl Into<String>) -> Self {
        Self {
            database: Self::default_database(),
            table: "tbl3_batch".to_string(),
            columns: (1..=4).map(|idx| format!("col{idx}")).collect(),
            indexes: Vec::new(),
            data_file: data_file.into(),
        }
    }

    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    /// `db.table`
    pub fn table_ref(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }

    /// `db.table.column`
    pub fn column_ref(&self, column: &str) -> String {
        format!("{}.{}.{}", self.database, self.table, column)
    }

    /// Column reference by position, rejecting out-of-range positions.
    pub fn column_at(&self, position: usize) -> Result<String, BenchError> {
        self.columns
            .get(position)
            .map(|column| self.column_ref(column))
            .ok_or_else(|| {
                BenchError::Configuration(
                    ErrorInfo::new("schema-column-missing", "table has too few columns")
                        .with_context("table", self.table_ref())
                        .with_context("position", position.to_string()),
                )
            })
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        for (field, value) in [
            ("database", &self.database),
            ("table", &self.table),
            ("data_file", &self.data_file),
        ] {
            if value.trim().is_empty() {
                return Err(BenchError::Configuration(
                    ErrorInfo::new("schema-field-empty", "schema field must not be empty")
                        .with_context("field", field),
                ));
            }
        }
        if self.columns.is_empty() {
            return Err(BenchError::configuration(
                "schema-no-columns",
                "schema must declare at least one column",
            ));
        }
        let mut seen = BTreeSet::new();
        for column in &self.columns {
            if !seen.insert(column.as_str()) {
                return Err(BenchError::Configuration(
                    ErrorInfo::new("schema-duplicate-column", "column declared twice")
                        .with_context("column", column.clone()),
                ));
            }
        }
        for index in &self.indexes {
            if !seen.contains(index.column.as_str()) {
                return Err(BenchError::Configuration(
                    ErrorInfo::new("schema-index-column", "index refers to an unknown column")
                        .with_context("column", index.column.clone()),
                ));
            }
        }
        Ok(())
    }

    /// Label describing the index set, `scan` when there is none.
    pub fn index_label(&self) -> String {
        if self.indexes.is_empty() {
            return "scan".to_string();
        }
        self.indexes
            .iter()
            .map(IndexSpec::label)
            .collect::<Vec<_>>()
            .join("+")
    }

    /// Schema creation followed by the data load. Indexes are declared before
    /// the load so the engine builds them while loading.
    pub fn setup_script(&self) -> Result<CommandScript, BenchError> {
        self.validate()?;
        let table = self.table_ref();
        let mut statements = vec![
            Statement::CreateDb {
                name: self.database.clone(),
            },
            Statement::CreateTable {
                name: self.table.clone(),
                database: self.database.clone(),
                columns: self.columns.len(),
            },
        ];
        statements.extend(self.columns.iter().map(|column| Statement::CreateColumn {
            name: column.clone(),
            table: table.clone(),
        }));
        statements.extend(self.indexes.iter().map(|index| Statement::CreateIndex {
            column: self.column_ref(&index.column),
            kind: index.kind,
            clustering: index.clustering,
        }));
        statements.push(Statement::Load {
            path: self.data_file.clone(),
        });
        Ok(CommandScript::new(statements))
    }
}
