//! Plain tabular results as they come back from a subgraph query, before any reshaping.

use std::fmt;

use serde::Serialize;
use serde_json::{Number, Value};
use thiserror::Error;

/// One scalar out of a query result. Subgraphs encode BigInt and BigDecimal as strings, so
/// equality here is exact: `Text("1")` and `Number(1)` are different cells.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
}

impl Cell {
    /// Numeric view of the cell, accepting number strings as subgraphs send them.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => n.as_f64(),
            Cell::Text(s) => s.parse::<f64>().ok(),
            Cell::Null | Cell::Bool(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Cell::Number(n) => n.as_u64(),
            Cell::Text(s) => s.parse::<u64>().ok(),
            Cell::Null | Cell::Bool(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&Value> for Cell {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => Cell::Number(n.clone()),
            Value::String(s) => Cell::Text(s.clone()),
            // Non-scalar leaves only show up when a selection stops at an object.
            other => Cell::Text(other.to_string()),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Number(n.into())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("unknown column {column}, table has columns {columns:?}")]
    UnknownColumn {
        column: String,
        columns: Vec<String>,
    },
    #[error("row has {actual} cells but table has {expected} columns")]
    RowWidth { expected: usize, actual: usize },
    #[error("duplicate column {0}")]
    DuplicateColumn(String),
    #[error("{column} value {value:?} is not a number")]
    NotANumber { column: String, value: String },
}

/// Rows of a single field-path query. For a one-to-many relation every row is one
/// (parent, child) pair, so parent fields repeat across rows.
#[derive(Clone, Debug, PartialEq)]
pub struct RawQueryTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RawQueryTable {
    pub fn new(columns: Vec<String>) -> Result<Self, TableError> {
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].contains(column) {
                return Err(TableError::DuplicateColumn(column.clone()));
            }
        }

        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Result<usize, TableError> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| TableError::UnknownColumn {
                column: column.to_string(),
                columns: self.columns.clone(),
            })
    }

    /// Renames columns through `rename`, e.g. to drop the `{collection}_` prefix.
    pub fn rename_columns(self, rename: impl Fn(&str) -> String) -> Result<Self, TableError> {
        let columns = self.columns.iter().map(|c| rename(c)).collect();
        let mut renamed = Self::new(columns)?;
        renamed.rows = self.rows;
        Ok(renamed)
    }
}
