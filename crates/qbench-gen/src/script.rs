//! Immutable command scripts handed to the trial executor.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::statement::{JoinStrategy, Statement};

/// Ordered, immutable sequence of statements.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandScript {
    statements: Vec<Statement>,
}

impl CommandScript {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Newline-terminated text fed to the client's standard input.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for statement in &self.statements {
            out.push_str(&statement.to_string());
            out.push('\n');
        }
        out
    }

    /// `(low, high)` of every select, in script order.
    pub fn select_ranges(&self) -> Vec<(i64, i64)> {
        self.statements
            .iter()
            .filter_map(Statement::select_range)
            .collect()
    }

    /// Join operators in script order.
    pub fn join_strategies(&self) -> Vec<JoinStrategy> {
        self.statements
            .iter()
            .filter_map(|statement| match statement {
                Statement::Join { strategy, .. } => Some(*strategy),
                _ => None,
            })
            .collect()
    }

    /// Statements with batch markers removed.
    pub fn without_batch_markers(&self) -> Vec<&Statement> {
        self.statements
            .iter()
            .filter(|statement| !statement.is_batch_marker())
            .collect()
    }
}

impl Display for CommandScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FromIterator<Statement> for CommandScript {
    fn from_iter<I: IntoIterator<Item = Statement>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
