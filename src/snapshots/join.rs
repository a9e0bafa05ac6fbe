use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::table::Cell;

use super::{CollapsedRow, CollapsedTable};

#[derive(Debug, Error, PartialEq)]
pub enum JoinError {
    #[error("need at least two tables to join, got {0}")]
    TooFewTables(usize),
    #[error("tables share no columns to join on, left has {left:?}, right has {right:?}")]
    SchemaMismatch {
        left: Vec<String>,
        right: Vec<String>,
    },
    #[error("column {0} is a sequence in one table and a grouping column in another")]
    AmbiguousColumn(String),
    #[error("snapshot {key:?} matches {matches} rows of the next table on {columns:?}")]
    NonUniqueMatch {
        columns: Vec<String>,
        key: Vec<Cell>,
        matches: usize,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct JoinedRow {
    pub key: Vec<Cell>,
    /// One sequence per sequence column, in column order.
    pub sequences: Vec<Vec<Cell>>,
}

/// Snapshots present in every joined table, each with all of their sequences.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinedTable {
    key_columns: Vec<String>,
    sequence_columns: Vec<String>,
    rows: Vec<JoinedRow>,
}

impl JoinedTable {
    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn sequence_columns(&self) -> &[String] {
        &self.sequence_columns
    }

    pub fn rows(&self) -> &[JoinedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn key_index(&self, column: &str) -> Option<usize> {
        self.key_columns.iter().position(|c| c == column)
    }

    pub fn sequence_index(&self, column: &str) -> Option<usize> {
        self.sequence_columns.iter().position(|c| c == column)
    }
}

impl From<&CollapsedTable> for JoinedTable {
    fn from(table: &CollapsedTable) -> Self {
        JoinedTable {
            key_columns: table.grouping_columns.clone(),
            sequence_columns: vec![table.sequence_column.clone()],
            rows: table
                .rows
                .iter()
                .map(|row| JoinedRow {
                    key: row.grouping.clone(),
                    sequences: vec![row.sequence.clone()],
                })
                .collect(),
        }
    }
}

fn check_ambiguous_columns(
    joined: &JoinedTable,
    table: &CollapsedTable,
) -> Result<(), JoinError> {
    if joined.key_columns.contains(&table.sequence_column) {
        return Err(JoinError::AmbiguousColumn(table.sequence_column.clone()));
    }

    match joined
        .sequence_columns
        .iter()
        .find(|column| table.grouping_columns.contains(column))
    {
        Some(column) => Err(JoinError::AmbiguousColumn(column.clone())),
        None => Ok(()),
    }
}

fn join_pair(joined: JoinedTable, table: &CollapsedTable) -> Result<JoinedTable, JoinError> {
    check_ambiguous_columns(&joined, table)?;

    let shared: Vec<(usize, usize)> = joined
        .key_columns
        .iter()
        .enumerate()
        .filter_map(|(left, column)| {
            table
                .grouping_columns
                .iter()
                .position(|c| c == column)
                .map(|right| (left, right))
        })
        .collect();

    // A sequence column present on both sides joins on equal sequences, as any other shared
    // column would.
    let shared_sequence = joined.sequence_index(&table.sequence_column);

    if shared.is_empty() && shared_sequence.is_none() {
        warn!(
            left = ?joined.key_columns,
            right = ?table.grouping_columns,
            "tables to join share no columns, check the queries that produced them"
        );
        return Err(JoinError::SchemaMismatch {
            left: joined.key_columns,
            right: table.grouping_columns.clone(),
        });
    }

    let right_extra: Vec<usize> = (0..table.grouping_columns.len())
        .filter(|right| !shared.iter().any(|(_, r)| r == right))
        .collect();

    if !right_extra.is_empty() {
        debug!(
            columns = ?right_extra
                .iter()
                .map(|&i| &table.grouping_columns[i])
                .collect::<Vec<_>>(),
            "carrying grouping columns found only in the right table"
        );
    }

    let mut right_rows: HashMap<Vec<&Cell>, Vec<usize>> = HashMap::new();
    for (i, row) in table.rows.iter().enumerate() {
        let key = shared
            .iter()
            .map(|&(_, right)| &row.grouping[right])
            .collect();
        right_rows.entry(key).or_default().push(i);
    }

    let mut key_columns = joined.key_columns.clone();
    key_columns.extend(right_extra.iter().map(|&i| table.grouping_columns[i].clone()));

    let mut sequence_columns = joined.sequence_columns.clone();
    if shared_sequence.is_none() {
        sequence_columns.push(table.sequence_column.clone());
    }

    let mut rows = Vec::new();
    for left_row in &joined.rows {
        let key: Vec<&Cell> = shared
            .iter()
            .map(|&(left, _)| &left_row.key[left])
            .collect();
        let Some(candidates) = right_rows.get(&key) else {
            continue;
        };

        let matches: Vec<&CollapsedRow> = candidates
            .iter()
            .map(|&i| &table.rows[i])
            .filter(|right_row| match shared_sequence {
                Some(index) => left_row.sequences[index] == right_row.sequence,
                None => true,
            })
            .collect();

        // Each snapshot must survive at most once, or the join would multiply rows.
        let right_row = match matches.as_slice() {
            [] => continue,
            [right_row] => *right_row,
            _ => {
                warn!(
                    key = ?key,
                    matches = matches.len(),
                    "snapshot matches several rows of the next table"
                );
                return Err(JoinError::NonUniqueMatch {
                    columns: shared
                        .iter()
                        .map(|&(left, _)| joined.key_columns[left].clone())
                        .collect(),
                    key: key.into_iter().cloned().collect(),
                    matches: matches.len(),
                });
            }
        };

        let mut sequences = left_row.sequences.clone();
        if shared_sequence.is_none() {
            sequences.push(right_row.sequence.clone());
        }

        let mut key = left_row.key.clone();
        key.extend(right_extra.iter().map(|&i| right_row.grouping[i].clone()));

        rows.push(JoinedRow { key, sequences });
    }

    Ok(JoinedTable {
        key_columns,
        sequence_columns,
        rows,
    })
}

/// Inner joins `tables` left to right on the grouping columns they share by name. A snapshot
/// missing from any table is dropped. Rows follow the order of the leftmost table, and a
/// snapshot matching several rows of a later table is a [`JoinError::NonUniqueMatch`].
pub fn join_all(tables: &[CollapsedTable]) -> Result<JoinedTable, JoinError> {
    let (first, rest) = match tables {
        [first, rest @ ..] if !rest.is_empty() => (first, rest),
        _ => return Err(JoinError::TooFewTables(tables.len())),
    };

    let joined = rest
        .iter()
        .try_fold(JoinedTable::from(first), join_pair)?;

    debug!(
        tables = tables.len(),
        rows = joined.len(),
        "joined collapsed snapshot tables"
    );

    Ok(joined)
}
