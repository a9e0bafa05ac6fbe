pub mod env;
pub mod financials;
pub mod log;
pub mod markets;
pub mod pool_snapshots;
pub mod pricing;
pub mod protocol;
pub mod snapshots;
pub mod subgraph;
pub mod table;
pub mod top_pools;
pub mod usage_metrics;

pub use financials::{fetch_financials, FinancialsDailySnapshot};
pub use markets::{
    asset_tvl, collateral_split, fetch_markets, top_markets_by_tvl, AssetTvl, CollateralSplit,
    Market,
};
pub use pool_snapshots::{
    fetch_pool_snapshots, PoolSnapshot, PoolSnapshotsRequest, TokenSnapshot,
};
pub use pricing::TokenDecimals;
pub use protocol::{DailySnapshotsRequest, ProtocolKind};
pub use subgraph::{SubgraphClient, SubgraphHttp};
pub use top_pools::{fetch_top_pools, LiquidityPool, PoolRanking};
pub use usage_metrics::{fetch_usage_metrics, UsageMetricsDailySnapshot};
