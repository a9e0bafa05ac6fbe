//! Turns the JSON a subgraph returns for a [`FieldPathQuery`] into a [`RawQueryTable`].
//!
//! List fields explode into one row per element. Paths below the same list zip element by
//! element, paths below different lists multiply out. An entity with an empty list yields no
//! rows.
use serde_json::Value;

use crate::table::{Cell, RawQueryTable};

use super::{FieldPathQuery, SubgraphError};

/// Leaf values for `path` below `value`, one per element of every list crossed on the way.
fn leaves(value: &Value, path: &[String]) -> Vec<Cell> {
    match (value, path.split_first()) {
        (Value::Array(items), _) => items.iter().flat_map(|item| leaves(item, path)).collect(),
        (_, None) => vec![Cell::from(value)],
        (Value::Object(fields), Some((head, tail))) => match fields.get(head) {
            Some(child) => leaves(child, tail),
            None => vec![Cell::Null],
        },
        _ => vec![Cell::Null],
    }
}

/// Path prefix ending at the first list the path crosses for this entity.
fn list_root<'a>(entity: &Value, path: &'a [String]) -> Option<&'a [String]> {
    let mut current = entity;
    for (i, field) in path.iter().enumerate() {
        current = current.get(field)?;
        if current.is_array() {
            return Some(&path[..=i]);
        }
    }
    None
}

struct Column {
    group: Option<usize>,
    values: Vec<Cell>,
}

fn entity_rows(entity: &Value, paths: &[Vec<String>]) -> Vec<Vec<Cell>> {
    let mut roots: Vec<&[String]> = Vec::new();
    let columns: Vec<Column> = paths
        .iter()
        .map(|path| {
            let group = list_root(entity, path).map(|root| {
                roots.iter().position(|r| *r == root).unwrap_or_else(|| {
                    roots.push(root);
                    roots.len() - 1
                })
            });
            Column {
                group,
                values: leaves(entity, path),
            }
        })
        .collect();

    let group_lengths: Vec<usize> = (0..roots.len())
        .map(|group| {
            columns
                .iter()
                .filter(|column| column.group == Some(group))
                .map(|column| column.values.len())
                .max()
                .unwrap_or(0)
        })
        .collect();

    if group_lengths.contains(&0) {
        return Vec::new();
    }

    let row_count: usize = group_lengths.iter().product();
    let mut rows = Vec::with_capacity(row_count);
    let mut positions = vec![0; group_lengths.len()];

    for _ in 0..row_count {
        let row = columns
            .iter()
            .map(|column| {
                let index = column.group.map_or(0, |group| positions[group]);
                column.values.get(index).cloned().unwrap_or(Cell::Null)
            })
            .collect();
        rows.push(row);

        // Odometer over the list groups, last group turning fastest.
        for group in (0..positions.len()).rev() {
            positions[group] += 1;
            if positions[group] < group_lengths[group] {
                break;
            }
            positions[group] = 0;
        }
    }

    rows
}

/// Flattens the `data` object of a response to `query`.
pub fn flatten_response(
    query: &FieldPathQuery,
    data: &Value,
) -> Result<RawQueryTable, SubgraphError> {
    let entities: &[Value] = match data.get(&query.collection) {
        Some(Value::Array(entities)) => entities.as_slice(),
        Some(Value::Null) => &[],
        Some(entity @ Value::Object(_)) => std::slice::from_ref(entity),
        _ => return Err(SubgraphError::MissingData(query.collection.clone())),
    };

    let mut table = RawQueryTable::new(query.column_names())?;
    for entity in entities {
        for row in entity_rows(entity, &query.field_paths) {
            table.push_row(row)?;
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn snapshot_query() -> FieldPathQuery {
        FieldPathQuery::new("liquidityPoolDailySnapshots")
            .select("id")
            .select("totalValueLockedUSD")
    }

    fn texts(row: &[Cell]) -> Vec<String> {
        row.iter().map(|cell| cell.to_string()).collect()
    }

    #[test]
    fn scalar_list_explodes_into_rows() {
        let query = snapshot_query().select("inputTokenWeights");
        let data = json!({
            "liquidityPoolDailySnapshots": [
                {"id": "s1", "totalValueLockedUSD": "100", "inputTokenWeights": ["0.5", "0.5"]},
                {"id": "s2", "totalValueLockedUSD": "90", "inputTokenWeights": ["1"]}
            ]
        });

        let table = flatten_response(&query, &data).unwrap();

        assert_eq!(
            table.columns(),
            &[
                "liquidityPoolDailySnapshots_id",
                "liquidityPoolDailySnapshots_totalValueLockedUSD",
                "liquidityPoolDailySnapshots_inputTokenWeights"
            ]
        );
        let rows: Vec<Vec<String>> = table.rows().iter().map(|row| texts(row)).collect();
        assert_eq!(
            rows,
            vec![
                vec!["s1", "100", "0.5"],
                vec!["s1", "100", "0.5"],
                vec!["s2", "90", "1"],
            ]
        );
    }

    #[test]
    fn fields_below_one_list_zip() {
        let query = snapshot_query()
            .select("inputTokens.name")
            .select("inputTokens.decimals");
        let data = json!({
            "liquidityPoolDailySnapshots": [{
                "id": "s1",
                "totalValueLockedUSD": "100",
                "inputTokens": [
                    {"name": "DAI", "decimals": 18},
                    {"name": "USDC", "decimals": 6}
                ]
            }]
        });

        let table = flatten_response(&query, &data).unwrap();

        let rows: Vec<Vec<String>> = table.rows().iter().map(|row| texts(row)).collect();
        assert_eq!(
            rows,
            vec![
                vec!["s1", "100", "DAI", "18"],
                vec!["s1", "100", "USDC", "6"],
            ]
        );
    }

    #[test]
    fn independent_lists_multiply() {
        let query = snapshot_query()
            .select("inputTokenWeights")
            .select("inputTokens.name");
        let data = json!({
            "liquidityPoolDailySnapshots": [{
                "id": "s1",
                "totalValueLockedUSD": "100",
                "inputTokenWeights": ["0.4", "0.6"],
                "inputTokens": [{"name": "DAI"}, {"name": "USDC"}]
            }]
        });

        let table = flatten_response(&query, &data).unwrap();

        assert_eq!(table.len(), 4);
    }

    #[test]
    fn empty_list_yields_no_rows() {
        let query = snapshot_query().select("inputTokenBalances");
        let data = json!({
            "liquidityPoolDailySnapshots": [
                {"id": "s1", "totalValueLockedUSD": "100", "inputTokenBalances": []}
            ]
        });

        let table = flatten_response(&query, &data).unwrap();

        assert!(table.is_empty());
    }

    #[test]
    fn nested_object_fields() {
        let query = FieldPathQuery::new("deposits")
            .select("hash")
            .select("market.name");
        let data = json!({
            "deposits": [{"hash": "0xabc", "market": {"name": "ETH-A"}}]
        });

        let table = flatten_response(&query, &data).unwrap();

        assert_eq!(table.columns()[1], "deposits_market_name");
        assert_eq!(table.rows()[0][1], Cell::from("ETH-A"));
    }

    #[test]
    fn missing_field_is_null() {
        let query = snapshot_query();
        let data = json!({"liquidityPoolDailySnapshots": [{"id": "s1"}]});

        let table = flatten_response(&query, &data).unwrap();

        assert_eq!(table.rows()[0][1], Cell::Null);
    }

    #[test]
    fn missing_collection_errors() {
        let result = flatten_response(&snapshot_query(), &json!({"other": []}));
        assert!(matches!(result, Err(SubgraphError::MissingData(_))));
    }

    #[test]
    fn empty_collection_gives_empty_table() {
        let data = json!({"liquidityPoolDailySnapshots": []});
        let table = flatten_response(&snapshot_query(), &data).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns().len(), 2);
    }
}
