use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

use crate::subgraph::{query_table, FieldPathQuery, OrderDirection, SubgraphClient};

const COLLECTION: &str = "liquidityPools";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PoolRanking {
    Tvl,
    Volume,
}

impl PoolRanking {
    fn order_by(&self) -> &'static str {
        match self {
            PoolRanking::Tvl => "totalValueLockedUSD",
            PoolRanking::Volume => "cumulativeVolumeUSD",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityPool {
    pub id: String,
    pub name: String,
    pub total_value_locked_usd: f64,
    pub cumulative_volume_usd: f64,
}

fn top_pools_query(ranking: PoolRanking, first: u32) -> FieldPathQuery {
    FieldPathQuery::new(COLLECTION)
        .first(first)
        .order_by(ranking.order_by(), OrderDirection::Desc)
        .select("id")
        .select("name")
        .select("totalValueLockedUSD")
        .select("cumulativeVolumeUSD")
}

/// The `first` largest pools by `ranking`, largest first.
pub async fn fetch_top_pools(
    client: &impl SubgraphClient,
    ranking: PoolRanking,
    first: u32,
) -> Result<Vec<LiquidityPool>> {
    let query = top_pools_query(ranking, first);
    let table = query_table(client, &query).await?;

    query
        .rows(&table)
        .map(|row| {
            Ok(LiquidityPool {
                id: row.text("id")?,
                name: row.text("name")?,
                total_value_locked_usd: row.number("totalValueLockedUSD")?,
                cumulative_volume_usd: row.number("cumulativeVolumeUSD")?,
            })
        })
        .collect()
}
