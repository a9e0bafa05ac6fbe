use std::io::Write;

use anyhow::Context;
use clap::{Parser, Subcommand};
use csv::WriterBuilder;
use tracing::info;

use subgraph_analysis::{
    asset_tvl, collateral_split, env::ENV_CONFIG, fetch_financials, fetch_markets,
    fetch_pool_snapshots, fetch_top_pools, fetch_usage_metrics, log, top_markets_by_tvl,
    DailySnapshotsRequest, PoolRanking, PoolSnapshotsRequest, ProtocolKind, SubgraphHttp,
    TokenDecimals,
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Subgraph endpoint, defaults to SUBGRAPH_URL.
    #[clap(long)]
    subgraph_url: Option<String>,
    /// Output file path (e.g., ./output.csv), stdout when omitted.
    #[clap(long)]
    output: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export implied token prices and depeg per daily snapshot of a pool to CSV.
    Depeg {
        /// Pool address.
        #[clap(long)]
        pool: String,
        /// Only snapshots after this unix timestamp.
        #[clap(long)]
        since: Option<i64>,
        /// Extra token decimals as NAME=DECIMALS, may be repeated.
        #[clap(long = "decimals")]
        decimals: Vec<String>,
    },
    /// Export protocol daily financials to CSV.
    Financials {
        #[clap(long, value_enum, default_value_t = ProtocolKind::Lending)]
        kind: ProtocolKind,
        #[clap(long, default_value_t = 100)]
        first: u32,
        /// Only days after this unix timestamp.
        #[clap(long)]
        since: Option<i64>,
    },
    /// Export protocol daily usage metrics to CSV.
    UsageMetrics {
        #[clap(long, value_enum, default_value_t = ProtocolKind::Lending)]
        kind: ProtocolKind,
        #[clap(long, default_value_t = 100)]
        first: u32,
        #[clap(long)]
        since: Option<i64>,
    },
    /// Export lending markets to CSV, optionally only the largest by TVL.
    Markets {
        #[clap(long, default_value_t = 100)]
        first: u32,
        #[clap(long)]
        top: Option<usize>,
    },
    /// Export market TVL per collateral asset to CSV.
    AssetTvl {
        #[clap(long, default_value_t = 100)]
        first: u32,
    },
    /// Export the stable / non-stable collateral split to CSV.
    CollateralSplit {
        #[clap(long, default_value_t = 100)]
        first: u32,
    },
    /// Export the largest pools to CSV.
    TopPools {
        #[clap(long, value_enum, default_value_t = PoolRanking::Tvl)]
        by: PoolRanking,
        #[clap(long, default_value_t = 10)]
        first: u32,
    },
}

fn csv_writer(path: Option<&str>) -> anyhow::Result<csv::Writer<Box<dyn Write>>> {
    let out: Box<dyn Write> = match path {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout()),
    };
    Ok(WriterBuilder::new().has_headers(true).from_writer(out))
}

fn parse_decimals(pairs: &[String]) -> anyhow::Result<TokenDecimals> {
    let mut token_decimals = TokenDecimals::with_defaults();
    for pair in pairs {
        let (name, decimals) = pair
            .split_once('=')
            .with_context(|| format!("expected NAME=DECIMALS, got {pair}"))?;
        let decimals = decimals
            .parse::<u32>()
            .with_context(|| format!("invalid decimals in {pair}"))?;
        token_decimals.insert(name, decimals);
    }
    Ok(token_decimals)
}

fn daily_request(kind: ProtocolKind, first: u32, since: Option<i64>) -> DailySnapshotsRequest {
    let request = DailySnapshotsRequest::new(kind, ENV_CONFIG.cap_first(first));
    match since {
        Some(since) => request.since(since),
        None => request,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    log::init();

    let cli = Cli::parse();

    let subgraph_url = cli
        .subgraph_url
        .or_else(|| ENV_CONFIG.subgraph_url.clone())
        .context("pass --subgraph-url or set SUBGRAPH_URL")?;
    let client = SubgraphHttp::new(&subgraph_url);
    let mut writer = csv_writer(cli.output.as_deref())?;

    match cli.command {
        Commands::Depeg {
            pool,
            since,
            decimals,
        } => {
            let token_decimals = parse_decimals(&decimals)?;
            let request = PoolSnapshotsRequest {
                pool,
                since,
                first: ENV_CONFIG.query_first,
            };

            let snapshots = fetch_pool_snapshots(&client, &request, &token_decimals).await?;
            if snapshots.is_empty() {
                info!(pool = %request.pool, "no data for pool");
            }

            writer.write_record([
                "snapshot_id",
                "timestamp",
                "total_value_locked_usd",
                "token_index",
                "token",
                "weight",
                "balance",
                "price",
                "depeg",
            ])?;
            for snapshot in &snapshots {
                for (index, token) in snapshot.tokens.iter().enumerate() {
                    writer.write_record([
                        snapshot.id.clone(),
                        snapshot.timestamp.to_string(),
                        snapshot.total_value_locked_usd.to_string(),
                        index.to_string(),
                        token.name.clone(),
                        token.weight.to_string(),
                        token.balance.to_string(),
                        token.price.to_string(),
                        token.depeg.to_string(),
                    ])?;
                }
            }
            info!(snapshots = snapshots.len(), "export depeg completed");
        }
        Commands::Financials { kind, first, since } => {
            let request = daily_request(kind, first, since);
            let snapshots = fetch_financials(&client, &request).await?;
            for snapshot in &snapshots {
                writer.serialize(snapshot)?;
            }
            info!(snapshots = snapshots.len(), "export financials completed");
        }
        Commands::UsageMetrics { kind, first, since } => {
            let request = daily_request(kind, first, since);
            let snapshots = fetch_usage_metrics(&client, &request).await?;
            for snapshot in &snapshots {
                writer.serialize(snapshot)?;
            }
            info!(snapshots = snapshots.len(), "export usage metrics completed");
        }
        Commands::Markets { first, top } => {
            let markets = fetch_markets(&client, ENV_CONFIG.cap_first(first)).await?;
            let markets = match top {
                Some(n) => top_markets_by_tvl(&markets, n),
                None => markets,
            };
            for market in &markets {
                writer.serialize(market)?;
            }
            info!(markets = markets.len(), "export markets completed");
        }
        Commands::AssetTvl { first } => {
            let markets = fetch_markets(&client, ENV_CONFIG.cap_first(first)).await?;
            let assets = asset_tvl(&markets);
            for asset in &assets {
                writer.serialize(asset)?;
            }
            info!(assets = assets.len(), "export asset tvl completed");
        }
        Commands::CollateralSplit { first } => {
            let markets = fetch_markets(&client, ENV_CONFIG.cap_first(first)).await?;
            let split = collateral_split(&asset_tvl(&markets));
            if split.is_empty() {
                info!("markets hold no TVL, no collateral split");
            }
            for part in &split {
                writer.serialize(part)?;
            }
        }
        Commands::TopPools { by, first } => {
            let pools = fetch_top_pools(&client, by, ENV_CONFIG.cap_first(first)).await?;
            for pool in &pools {
                writer.serialize(pool)?;
            }
            info!(pools = pools.len(), "export top pools completed");
        }
    }

    writer.flush()?;
    Ok(())
}
