//! Reshaping of denormalized snapshot query results. A subgraph query that walks a one-to-many
//! relation (a pool snapshot and its input tokens) returns one row per child. Each such table is
//! collapsed back to one row per snapshot, then the collapsed tables are joined on their shared
//! grouping columns.
mod collapse;
mod join;

pub use collapse::{collapse, CollapsedRow, CollapsedTable};
pub use join::{join_all, JoinError, JoinedRow, JoinedTable};
