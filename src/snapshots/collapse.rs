use std::collections::HashMap;

use crate::table::{Cell, RawQueryTable, TableError};

#[derive(Clone, Debug, PartialEq)]
pub struct CollapsedRow {
    /// Cells of the grouping columns, in table column order.
    pub grouping: Vec<Cell>,
    /// Values of the repeating column, in input row order.
    pub sequence: Vec<Cell>,
}

/// One row per snapshot, the repeating column gathered into an ordered sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct CollapsedTable {
    pub(super) grouping_columns: Vec<String>,
    pub(super) sequence_column: String,
    pub(super) rows: Vec<CollapsedRow>,
}

impl CollapsedTable {
    pub fn grouping_columns(&self) -> &[String] {
        &self.grouping_columns
    }

    pub fn sequence_column(&self) -> &str {
        &self.sequence_column
    }

    pub fn rows(&self) -> &[CollapsedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Collapses `table` to one row per distinct combination of every column except
/// `repeating_column`. Groups come out in order of first appearance and values within a group
/// keep their input order.
pub fn collapse(
    table: &RawQueryTable,
    repeating_column: &str,
) -> Result<CollapsedTable, TableError> {
    let repeating_index = table.column_index(repeating_column)?;

    let grouping_columns = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != repeating_index)
        .map(|(_, column)| column.clone())
        .collect();

    let mut group_positions: HashMap<Vec<&Cell>, usize> = HashMap::new();
    let mut rows: Vec<CollapsedRow> = Vec::new();

    for row in table.rows() {
        let key: Vec<&Cell> = row
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != repeating_index)
            .map(|(_, cell)| cell)
            .collect();
        let value = row[repeating_index].clone();

        match group_positions.get(&key) {
            Some(&position) => rows[position].sequence.push(value),
            None => {
                let grouping = key.iter().map(|&cell| cell.clone()).collect();
                group_positions.insert(key, rows.len());
                rows.push(CollapsedRow {
                    grouping,
                    sequence: vec![value],
                });
            }
        }
    }

    Ok(CollapsedTable {
        grouping_columns,
        sequence_column: repeating_column.to_string(),
        rows,
    })
}
