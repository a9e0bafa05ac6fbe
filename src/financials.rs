//! Protocol level daily financials, one row per day.
use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use serde::Serialize;
use tracing::info;

use crate::{
    protocol::{DailySnapshotsRequest, ProtocolKind},
    snapshots::collapse,
    subgraph::{query_table, EntityRow, FieldPathQuery, SubgraphClient},
    table::Cell,
};

const COLLECTION: &str = "financialsDailySnapshots";

const SECONDS_PER_DAY: i64 = 86_400;

const FIELDS: [&str; 9] = [
    "id",
    "timestamp",
    "totalValueLockedUSD",
    "dailySupplySideRevenueUSD",
    "dailyProtocolSideRevenueUSD",
    "dailyTotalRevenueUSD",
    "cumulativeSupplySideRevenueUSD",
    "cumulativeProtocolSideRevenueUSD",
    "cumulativeTotalRevenueUSD",
];

const LENDING_FIELDS: [&str; 8] = [
    "totalDepositBalanceUSD",
    "totalBorrowBalanceUSD",
    "dailyDepositUSD",
    "dailyBorrowUSD",
    "dailyLiquidateUSD",
    "cumulativeBorrowUSD",
    "cumulativeLiquidateUSD",
    MINTED_SUPPLIES,
];

const DEX_FIELDS: [&str; 2] = ["dailyVolumeUSD", "cumulativeVolumeUSD"];

/// Raw amounts of tokens minted by a lending protocol, e.g. Dai for MakerDAO. A list.
const MINTED_SUPPLIES: &str = "mintedTokenSupplies";
const MINTED_SUPPLY_SCALE: f64 = 1e18;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialsDailySnapshot {
    /// Days since the unix epoch, as the subgraph keys these snapshots.
    pub day: i64,
    pub date: NaiveDate,
    pub timestamp: i64,
    pub total_value_locked_usd: f64,
    pub daily_supply_side_revenue_usd: f64,
    pub daily_protocol_side_revenue_usd: f64,
    pub daily_total_revenue_usd: f64,
    pub cumulative_supply_side_revenue_usd: f64,
    pub cumulative_protocol_side_revenue_usd: f64,
    pub cumulative_total_revenue_usd: f64,
    // Lending protocols.
    pub total_deposit_balance_usd: Option<f64>,
    pub total_borrow_balance_usd: Option<f64>,
    pub daily_deposit_usd: Option<f64>,
    pub daily_borrow_usd: Option<f64>,
    pub daily_liquidate_usd: Option<f64>,
    pub cumulative_borrow_usd: Option<f64>,
    pub cumulative_liquidate_usd: Option<f64>,
    /// Sum of minted token supplies in whole tokens.
    pub minted_token_supply: Option<f64>,
    /// Borrowed over deposited, `None` without deposits.
    pub collateralization_ratio: Option<f64>,
    // DEXes.
    pub daily_volume_usd: Option<f64>,
    pub cumulative_volume_usd: Option<f64>,
}

pub fn date_from_day(day: i64) -> Option<NaiveDate> {
    Utc.timestamp_opt(day.checked_mul(SECONDS_PER_DAY)?, 0)
        .single()
        .map(|date_time| date_time.date_naive())
}

pub fn collateralization_ratio(borrow_balance: f64, deposit_balance: f64) -> Option<f64> {
    if deposit_balance == 0.0 {
        None
    } else {
        Some(borrow_balance / deposit_balance)
    }
}

/// Total of the non-null raw supplies in whole tokens, `None` when there are none.
pub fn minted_token_supply(supplies: &[Cell]) -> Result<Option<f64>> {
    let amounts = supplies
        .iter()
        .filter(|cell| **cell != Cell::Null)
        .map(|cell| {
            cell.as_f64()
                .with_context(|| format!("minted supply {cell} is not a number"))
        })
        .collect::<Result<Vec<_>>>()?;

    if amounts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(amounts.iter().sum::<f64>() / MINTED_SUPPLY_SCALE))
    }
}

fn financials_query(request: &DailySnapshotsRequest) -> FieldPathQuery {
    let fields: Vec<&str> = match request.kind {
        ProtocolKind::Lending => FIELDS.iter().chain(LENDING_FIELDS.iter()).copied().collect(),
        ProtocolKind::Dex => FIELDS.iter().chain(DEX_FIELDS.iter()).copied().collect(),
    };
    request.query(COLLECTION, &fields)
}

fn snapshot(
    kind: ProtocolKind,
    row: &EntityRow,
    minted_supplies: &[Cell],
) -> Result<FinancialsDailySnapshot> {
    let day = row.number("id")? as i64;

    let mut snapshot = FinancialsDailySnapshot {
        day,
        date: date_from_day(day).with_context(|| format!("day {day} out of range"))?,
        timestamp: row.number("timestamp")? as i64,
        total_value_locked_usd: row.number("totalValueLockedUSD")?,
        daily_supply_side_revenue_usd: row.number("dailySupplySideRevenueUSD")?,
        daily_protocol_side_revenue_usd: row.number("dailyProtocolSideRevenueUSD")?,
        daily_total_revenue_usd: row.number("dailyTotalRevenueUSD")?,
        cumulative_supply_side_revenue_usd: row.number("cumulativeSupplySideRevenueUSD")?,
        cumulative_protocol_side_revenue_usd: row.number("cumulativeProtocolSideRevenueUSD")?,
        cumulative_total_revenue_usd: row.number("cumulativeTotalRevenueUSD")?,
        total_deposit_balance_usd: None,
        total_borrow_balance_usd: None,
        daily_deposit_usd: None,
        daily_borrow_usd: None,
        daily_liquidate_usd: None,
        cumulative_borrow_usd: None,
        cumulative_liquidate_usd: None,
        minted_token_supply: None,
        collateralization_ratio: None,
        daily_volume_usd: None,
        cumulative_volume_usd: None,
    };

    match kind {
        ProtocolKind::Lending => {
            let deposits = row.number("totalDepositBalanceUSD")?;
            let borrows = row.number("totalBorrowBalanceUSD")?;
            snapshot.total_deposit_balance_usd = Some(deposits);
            snapshot.total_borrow_balance_usd = Some(borrows);
            snapshot.collateralization_ratio = collateralization_ratio(borrows, deposits);
            snapshot.daily_deposit_usd = row.optional_number("dailyDepositUSD")?;
            snapshot.daily_borrow_usd = row.optional_number("dailyBorrowUSD")?;
            snapshot.daily_liquidate_usd = row.optional_number("dailyLiquidateUSD")?;
            snapshot.cumulative_borrow_usd = row.optional_number("cumulativeBorrowUSD")?;
            snapshot.cumulative_liquidate_usd = row.optional_number("cumulativeLiquidateUSD")?;
            snapshot.minted_token_supply = minted_token_supply(minted_supplies)?;
        }
        ProtocolKind::Dex => {
            snapshot.daily_volume_usd = row.optional_number("dailyVolumeUSD")?;
            snapshot.cumulative_volume_usd = row.optional_number("cumulativeVolumeUSD")?;
        }
    }

    Ok(snapshot)
}

/// Most recent `request.first` daily financials, newest first.
pub async fn fetch_financials(
    client: &impl SubgraphClient,
    request: &DailySnapshotsRequest,
) -> Result<Vec<FinancialsDailySnapshot>> {
    let query = financials_query(request);
    let table = query_table(client, &query).await?;
    if table.is_empty() {
        info!("no financials snapshots found");
        return Ok(Vec::new());
    }

    match request.kind {
        // The minted supplies list explodes every day into one row per token.
        ProtocolKind::Lending => {
            let minted_column = query.column_for(MINTED_SUPPLIES);
            let days = collapse(&table, &minted_column)?;
            days.rows()
                .iter()
                .map(|day| {
                    let row = EntityRow::new(&query, days.grouping_columns(), &day.grouping);
                    snapshot(request.kind, &row, &day.sequence)
                })
                .collect()
        }
        ProtocolKind::Dex => query
            .rows(&table)
            .map(|row| snapshot(request.kind, &row, &[]))
            .collect(),
    }
}
