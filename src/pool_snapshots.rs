//! Daily liquidity pool snapshots with implied token prices and depeg.
//!
//! A snapshot's per-token fields live in separate lists on the subgraph (`inputTokenWeights`,
//! `inputTokenBalances`, `inputTokens`). Each is fetched with its own query, collapsed back to
//! one row per snapshot, and the results joined. Position `i` of every list refers to the same
//! token.
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    pricing::{price_tokens, TokenDecimals},
    snapshots::{collapse, join_all, CollapsedTable, JoinedRow, JoinedTable},
    subgraph::{query_table, FieldPathQuery, FilterOp, OrderDirection, SubgraphClient},
    table::{Cell, RawQueryTable},
};

const COLLECTION: &str = "liquidityPoolDailySnapshots";

const GROUPING_FIELDS: [&str; 3] = ["id", "timestamp", "totalValueLockedUSD"];

const WEIGHTS: &str = "inputTokenWeights";
const BALANCES: &str = "inputTokenBalances";
const TOKEN_NAMES: &str = "inputTokens.name";
const TOKEN_NAME_COLUMN: &str = "inputTokens_name";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSnapshot {
    pub name: String,
    pub weight: f64,
    /// Raw integer amount, not scaled by decimals.
    pub balance: f64,
    pub price: f64,
    pub depeg: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    pub id: String,
    pub timestamp: i64,
    pub total_value_locked_usd: f64,
    pub tokens: Vec<TokenSnapshot>,
}

#[derive(Clone, Debug)]
pub struct PoolSnapshotsRequest {
    pub pool: String,
    /// Only snapshots strictly after this unix timestamp.
    pub since: Option<i64>,
    pub first: u32,
}

impl PoolSnapshotsRequest {
    fn query(&self, field: &str) -> FieldPathQuery {
        let query = FieldPathQuery::new(COLLECTION)
            .first(self.first)
            .order_by("timestamp", OrderDirection::Desc)
            .filter("pool", FilterOp::Eq, self.pool.to_lowercase());

        let query = match self.since {
            Some(since) => query.filter("timestamp", FilterOp::Gt, since),
            None => query,
        };

        GROUPING_FIELDS
            .iter()
            .fold(query, |query, grouping| query.select(grouping))
            .select(field)
    }
}

fn strip_collection(column: &str) -> String {
    column
        .strip_prefix(COLLECTION)
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(column)
        .to_string()
}

fn sequence<'a>(table: &JoinedTable, row: &'a JoinedRow, column: &str) -> Result<&'a [Cell]> {
    let index = table
        .sequence_index(column)
        .with_context(|| format!("joined table has no {column} column"))?;
    Ok(&row.sequences[index])
}

fn key<'a>(table: &JoinedTable, row: &'a JoinedRow, column: &str) -> Result<&'a Cell> {
    let index = table
        .key_index(column)
        .with_context(|| format!("joined table has no {column} column"))?;
    Ok(&row.key[index])
}

fn numbers(cells: &[Cell], column: &str) -> Result<Vec<f64>> {
    cells
        .iter()
        .map(|cell| {
            cell.as_f64()
                .with_context(|| format!("{column} value {cell} is not a number"))
        })
        .collect()
}

fn pool_snapshot(
    table: &JoinedTable,
    row: &JoinedRow,
    token_decimals: &TokenDecimals,
) -> Result<PoolSnapshot> {
    let id = key(table, row, "id")?.to_string();
    let timestamp = key(table, row, "timestamp")?
        .as_f64()
        .context("snapshot timestamp is not a number")? as i64;
    let total_value_locked_usd = key(table, row, "totalValueLockedUSD")?
        .as_f64()
        .context("snapshot TVL is not a number")?;

    let names: Vec<String> = sequence(table, row, TOKEN_NAME_COLUMN)?
        .iter()
        .map(|cell| cell.to_string())
        .collect();
    let weights = numbers(sequence(table, row, WEIGHTS)?, WEIGHTS)?;
    let balances = numbers(sequence(table, row, BALANCES)?, BALANCES)?;

    let pricings = price_tokens(
        total_value_locked_usd,
        &names,
        &weights,
        &balances,
        token_decimals,
    )
    .with_context(|| format!("failed to price tokens of snapshot {id}"))?;

    let tokens = names
        .into_iter()
        .zip(weights)
        .zip(balances)
        .zip(pricings)
        .map(|(((name, weight), balance), pricing)| TokenSnapshot {
            name,
            weight,
            balance,
            price: pricing.price,
            depeg: pricing.depeg,
        })
        .collect();

    Ok(PoolSnapshot {
        id,
        timestamp,
        total_value_locked_usd,
        tokens,
    })
}

/// Converts joined snapshot rows into priced records, in joined row order.
pub fn pool_snapshots_from_joined(
    table: &JoinedTable,
    token_decimals: &TokenDecimals,
) -> Result<Vec<PoolSnapshot>> {
    table
        .rows()
        .iter()
        .map(|row| pool_snapshot(table, row, token_decimals))
        .collect()
}

fn collapse_renamed(table: RawQueryTable, repeating_column: &str) -> Result<CollapsedTable> {
    let table = table.rename_columns(strip_collection)?;
    Ok(collapse(&table, repeating_column)?)
}

/// Fetches the daily snapshots of one pool and prices every token in them. Returns an empty list
/// when the subgraph has no snapshots for the pool.
pub async fn fetch_pool_snapshots(
    client: &impl SubgraphClient,
    request: &PoolSnapshotsRequest,
    token_decimals: &TokenDecimals,
) -> Result<Vec<PoolSnapshot>> {
    let mut collapsed = Vec::new();
    for (field, column) in [
        (WEIGHTS, WEIGHTS),
        (BALANCES, BALANCES),
        (TOKEN_NAMES, TOKEN_NAME_COLUMN),
    ] {
        let table = query_table(client, &request.query(field)).await?;
        if table.is_empty() {
            info!(pool = %request.pool, field, "no snapshot data for pool");
            return Ok(Vec::new());
        }
        collapsed.push(collapse_renamed(table, column)?);
    }

    let joined = join_all(&collapsed)?;
    let dropped = collapsed
        .iter()
        .map(|table| table.len())
        .max()
        .unwrap_or(0)
        .saturating_sub(joined.len());
    if dropped > 0 {
        warn!(
            pool = %request.pool,
            dropped,
            "snapshots missing from some queries were dropped by the join"
        );
    }

    pool_snapshots_from_joined(&joined, token_decimals)
}
