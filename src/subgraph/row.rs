use crate::table::{Cell, RawQueryTable, TableError};

use super::FieldPathQuery;

/// One result row, read by the field paths of the query that produced it.
pub struct EntityRow<'a> {
    query: &'a FieldPathQuery,
    columns: &'a [String],
    cells: &'a [Cell],
}

impl<'a> EntityRow<'a> {
    pub fn new(query: &'a FieldPathQuery, columns: &'a [String], cells: &'a [Cell]) -> Self {
        Self {
            query,
            columns,
            cells,
        }
    }

    /// The cell selected by dotted `path`.
    pub fn cell(&self, path: &str) -> Result<&'a Cell, TableError> {
        let column = self.query.column_for(path);
        let index = self
            .columns
            .iter()
            .position(|c| *c == column)
            .ok_or_else(|| TableError::UnknownColumn {
                column,
                columns: self.columns.to_vec(),
            })?;

        self.cells.get(index).ok_or(TableError::RowWidth {
            expected: self.columns.len(),
            actual: self.cells.len(),
        })
    }

    pub fn text(&self, path: &str) -> Result<String, TableError> {
        self.cell(path).map(|cell| cell.to_string())
    }

    pub fn number(&self, path: &str) -> Result<f64, TableError> {
        let cell = self.cell(path)?;
        cell.as_f64().ok_or_else(|| TableError::NotANumber {
            column: path.to_string(),
            value: cell.to_string(),
        })
    }

    /// Like [`EntityRow::number`], `None` when the subgraph returned null.
    pub fn optional_number(&self, path: &str) -> Result<Option<f64>, TableError> {
        match self.cell(path)? {
            Cell::Null => Ok(None),
            _ => self.number(path).map(Some),
        }
    }

    pub fn count(&self, path: &str) -> Result<u64, TableError> {
        let cell = self.cell(path)?;
        cell.as_u64().ok_or_else(|| TableError::NotANumber {
            column: path.to_string(),
            value: cell.to_string(),
        })
    }
}

impl FieldPathQuery {
    /// Rows of `table`, which must be the flattened result of this query.
    pub fn rows<'a>(&'a self, table: &'a RawQueryTable) -> impl Iterator<Item = EntityRow<'a>> {
        table
            .rows()
            .iter()
            .map(move |cells| EntityRow::new(self, table.columns(), cells))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::subgraph::flatten_response;

    use super::*;

    #[test]
    fn reads_cells_by_field_path() {
        let query = FieldPathQuery::new("markets")
            .select("totalValueLockedUSD")
            .select("inputToken.symbol")
            .select("outputToken");
        let data = json!({
            "markets": [{
                "totalValueLockedUSD": "12.5",
                "inputToken": {"symbol": "WETH"},
                "outputToken": null
            }]
        });
        let table = flatten_response(&query, &data).unwrap();

        let row = query.rows(&table).next().unwrap();

        assert_eq!(row.number("totalValueLockedUSD").unwrap(), 12.5);
        assert_eq!(row.text("inputToken.symbol").unwrap(), "WETH");
        assert_eq!(row.optional_number("outputToken").unwrap(), None);
        assert!(matches!(
            row.number("inputToken.symbol"),
            Err(TableError::NotANumber { .. })
        ));
        assert!(matches!(
            row.cell("name"),
            Err(TableError::UnknownColumn { .. })
        ));
    }
}
