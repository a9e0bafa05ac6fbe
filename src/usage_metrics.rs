//! Daily protocol usage: transaction counts and active users.
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::{
    financials::date_from_day,
    protocol::{DailySnapshotsRequest, ProtocolKind},
    subgraph::{query_table, EntityRow, FieldPathQuery, SubgraphClient},
};

const COLLECTION: &str = "usageMetricsDailySnapshots";

const FIELDS: [&str; 7] = [
    "id",
    "timestamp",
    "dailyActiveUsers",
    "cumulativeUniqueUsers",
    "dailyTransactionCount",
    "dailyDepositCount",
    "dailyWithdrawCount",
];

const LENDING_FIELDS: [&str; 3] = ["dailyBorrowCount", "dailyRepayCount", "dailyLiquidateCount"];

const DEX_FIELDS: [&str; 1] = ["dailySwapCount"];

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetricsDailySnapshot {
    pub day: i64,
    pub date: NaiveDate,
    pub timestamp: i64,
    pub daily_active_users: u64,
    pub cumulative_unique_users: u64,
    pub daily_transaction_count: u64,
    pub daily_deposit_count: u64,
    pub daily_withdraw_count: u64,
    pub daily_borrow_count: Option<u64>,
    pub daily_repay_count: Option<u64>,
    pub daily_liquidate_count: Option<u64>,
    pub daily_swap_count: Option<u64>,
}

fn usage_metrics_query(request: &DailySnapshotsRequest) -> FieldPathQuery {
    let fields: Vec<&str> = match request.kind {
        ProtocolKind::Lending => FIELDS.iter().chain(LENDING_FIELDS.iter()).copied().collect(),
        ProtocolKind::Dex => FIELDS.iter().chain(DEX_FIELDS.iter()).copied().collect(),
    };
    request.query(COLLECTION, &fields)
}

fn snapshot(kind: ProtocolKind, row: &EntityRow) -> Result<UsageMetricsDailySnapshot> {
    let day = row.number("id")? as i64;

    let (borrows, repays, liquidations, swaps) = match kind {
        ProtocolKind::Lending => (
            Some(row.count("dailyBorrowCount")?),
            Some(row.count("dailyRepayCount")?),
            Some(row.count("dailyLiquidateCount")?),
            None,
        ),
        ProtocolKind::Dex => (None, None, None, Some(row.count("dailySwapCount")?)),
    };

    Ok(UsageMetricsDailySnapshot {
        day,
        date: date_from_day(day).with_context(|| format!("day {day} out of range"))?,
        timestamp: row.number("timestamp")? as i64,
        daily_active_users: row.count("dailyActiveUsers")?,
        cumulative_unique_users: row.count("cumulativeUniqueUsers")?,
        daily_transaction_count: row.count("dailyTransactionCount")?,
        daily_deposit_count: row.count("dailyDepositCount")?,
        daily_withdraw_count: row.count("dailyWithdrawCount")?,
        daily_borrow_count: borrows,
        daily_repay_count: repays,
        daily_liquidate_count: liquidations,
        daily_swap_count: swaps,
    })
}

/// Most recent `request.first` days of usage, newest first.
pub async fn fetch_usage_metrics(
    client: &impl SubgraphClient,
    request: &DailySnapshotsRequest,
) -> Result<Vec<UsageMetricsDailySnapshot>> {
    let query = usage_metrics_query(request);
    let table = query_table(client, &query).await?;
    if table.is_empty() {
        info!("no usage metrics snapshots found");
    }

    query
        .rows(&table)
        .map(|row| snapshot(request.kind, &row))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::subgraph::MockSubgraphClient;

    use super::*;

    #[tokio::test]
    async fn fetches_lending_usage() {
        let mut client = MockSubgraphClient::new();
        client
            .expect_post_query()
            .withf(|document| {
                document.contains("usageMetricsDailySnapshots(first: 100")
                    && document.contains("dailyRepayCount")
                    && !document.contains("dailySwapCount")
            })
            .returning(|_| {
                Ok(json!({
                    "usageMetricsDailySnapshots": [{
                        "id": "19000",
                        "timestamp": "1641600123",
                        "dailyActiveUsers": 120,
                        "cumulativeUniqueUsers": 50000,
                        "dailyTransactionCount": 300,
                        "dailyDepositCount": 40,
                        "dailyWithdrawCount": 30,
                        "dailyBorrowCount": 20,
                        "dailyRepayCount": 10,
                        "dailyLiquidateCount": 2
                    }]
                }))
            });

        let request = DailySnapshotsRequest::new(ProtocolKind::Lending, 100);
        let snapshots = fetch_usage_metrics(&client, &request).await.unwrap();

        assert_eq!(
            snapshots,
            vec![UsageMetricsDailySnapshot {
                day: 19000,
                date: NaiveDate::from_ymd_opt(2022, 1, 8).unwrap(),
                timestamp: 1641600123,
                daily_active_users: 120,
                cumulative_unique_users: 50000,
                daily_transaction_count: 300,
                daily_deposit_count: 40,
                daily_withdraw_count: 30,
                daily_borrow_count: Some(20),
                daily_repay_count: Some(10),
                daily_liquidate_count: Some(2),
                daily_swap_count: None,
            }]
        );
    }

    #[tokio::test]
    async fn fetches_dex_usage_since() {
        let mut client = MockSubgraphClient::new();
        client
            .expect_post_query()
            .withf(|document| {
                document.contains("where: {timestamp_gt: 1641500000}")
                    && document.contains("dailySwapCount")
            })
            .returning(|_| {
                Ok(json!({
                    "usageMetricsDailySnapshots": [{
                        "id": "19000",
                        "timestamp": "1641600123",
                        "dailyActiveUsers": 7,
                        "cumulativeUniqueUsers": 900,
                        "dailyTransactionCount": 25,
                        "dailyDepositCount": 3,
                        "dailyWithdrawCount": 2,
                        "dailySwapCount": 20
                    }]
                }))
            });

        let request = DailySnapshotsRequest::new(ProtocolKind::Dex, 1000).since(1641500000);
        let snapshots = fetch_usage_metrics(&client, &request).await.unwrap();

        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].daily_swap_count, Some(20));
        assert_eq!(snapshots[0].daily_borrow_count, None);
    }

    #[tokio::test]
    async fn non_numeric_count_errors() {
        let mut client = MockSubgraphClient::new();
        client.expect_post_query().returning(|_| {
            Ok(json!({
                "usageMetricsDailySnapshots": [{
                    "id": "19000",
                    "timestamp": "1641600123",
                    "dailyActiveUsers": null,
                    "cumulativeUniqueUsers": 900,
                    "dailyTransactionCount": 25,
                    "dailyDepositCount": 3,
                    "dailyWithdrawCount": 2,
                    "dailySwapCount": 20
                }]
            }))
        });

        let request = DailySnapshotsRequest::new(ProtocolKind::Dex, 1000);
        let result = fetch_usage_metrics(&client, &request).await;

        assert!(result.is_err());
    }
}
