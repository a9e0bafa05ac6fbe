//! Lending markets and how their TVL splits across collateral assets.
use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::subgraph::{query_table, EntityRow, FieldPathQuery, FilterOp, SubgraphClient};

const COLLECTION: &str = "markets";

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Markets whose input token is an LP token take their asset symbol from the market name, e.g.
/// `UNIV2DAIETH-A`.
const LP_TOKEN_NAME: &str = "Uniswap V2";

/// Assets below this TVL are left out of the asset split.
const MIN_ASSET_TVL_USD: f64 = 1.0;

pub const STABLECOINS: [&str; 5] = ["TUSD", "GUSD", "USDC", "PAX", "USDT"];

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub id: String,
    pub name: String,
    pub total_value_locked_usd: f64,
    pub input_token_id: String,
    pub input_token_symbol: String,
    pub input_token_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetTvl {
    pub token_id: String,
    pub token: String,
    pub total_value_locked_usd: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollateralSplit {
    pub collateral_type: String,
    pub ratio: f64,
}

fn markets_query(first: u32) -> FieldPathQuery {
    FieldPathQuery::new(COLLECTION)
        .first(first)
        .filter("id", FilterOp::Not, ZERO_ADDRESS)
        .select("id")
        .select("name")
        .select("totalValueLockedUSD")
        .select("inputToken.id")
        .select("inputToken.symbol")
        .select("inputToken.name")
}

fn market(row: &EntityRow) -> Result<Market> {
    Ok(Market {
        id: row.text("id")?,
        name: row.text("name")?,
        total_value_locked_usd: row.number("totalValueLockedUSD")?,
        input_token_id: row.text("inputToken.id")?,
        input_token_symbol: row.text("inputToken.symbol")?,
        input_token_name: row.text("inputToken.name")?,
    })
}

pub async fn fetch_markets(client: &impl SubgraphClient, first: u32) -> Result<Vec<Market>> {
    let query = markets_query(first);
    let table = query_table(client, &query).await?;
    if table.is_empty() {
        info!("no markets found");
    }

    query.rows(&table).map(|row| market(&row)).collect()
}

/// The `n` markets with the most TVL, largest first.
pub fn top_markets_by_tvl(markets: &[Market], n: usize) -> Vec<Market> {
    let mut markets = markets.to_vec();
    markets.sort_by(|a, b| b.total_value_locked_usd.total_cmp(&a.total_value_locked_usd));
    markets.truncate(n);
    markets
}

fn asset_symbol(market: &Market) -> &str {
    if market.input_token_name == LP_TOKEN_NAME {
        market
            .name
            .split('-')
            .next()
            .unwrap_or(&market.input_token_symbol)
    } else {
        &market.input_token_symbol
    }
}

/// Market TVL summed per input token, ordered by token id then symbol. Assets under
/// `MIN_ASSET_TVL_USD` are dropped.
pub fn asset_tvl(markets: &[Market]) -> Vec<AssetTvl> {
    let mut totals: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    for market in markets {
        *totals
            .entry((market.input_token_id.as_str(), asset_symbol(market)))
            .or_default() += market.total_value_locked_usd;
    }

    totals
        .into_iter()
        .filter(|(_, tvl)| *tvl >= MIN_ASSET_TVL_USD)
        .map(|((token_id, token), total_value_locked_usd)| AssetTvl {
            token_id: token_id.to_string(),
            token: token.to_string(),
            total_value_locked_usd,
        })
        .collect()
}

/// Share of asset TVL held in stablecoins, `None` when there is no TVL at all.
pub fn stable_ratio(assets: &[AssetTvl]) -> Option<f64> {
    let total: f64 = assets.iter().map(|asset| asset.total_value_locked_usd).sum();
    if total == 0.0 {
        return None;
    }

    let stable: f64 = assets
        .iter()
        .filter(|asset| STABLECOINS.contains(&asset.token.as_str()))
        .map(|asset| asset.total_value_locked_usd)
        .sum();

    Some(stable / total)
}

pub fn collateral_split(assets: &[AssetTvl]) -> Vec<CollateralSplit> {
    match stable_ratio(assets) {
        Some(ratio) => vec![
            CollateralSplit {
                collateral_type: "STABLE".to_string(),
                ratio,
            },
            CollateralSplit {
                collateral_type: "NON-STABLE".to_string(),
                ratio: 1.0 - ratio,
            },
        ],
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::subgraph::MockSubgraphClient;

    use super::*;

    fn market(id: &str, name: &str, tvl: f64, token: (&str, &str, &str)) -> Market {
        Market {
            id: id.to_string(),
            name: name.to_string(),
            total_value_locked_usd: tvl,
            input_token_id: token.0.to_string(),
            input_token_symbol: token.1.to_string(),
            input_token_name: token.2.to_string(),
        }
    }

    fn markets() -> Vec<Market> {
        let weth = ("0xweth", "WETH", "Wrapped Ether");
        let usdc = ("0xusdc", "USDC", "USD Coin");
        let lp = ("0xlp", "UNI-V2", LP_TOKEN_NAME);
        vec![
            market("0x1", "ETH-A", 600.0, weth),
            market("0x2", "ETH-B", 200.0, weth),
            market("0x3", "USDC-A", 150.0, usdc),
            market("0x4", "UNIV2DAIETH-A", 50.0, lp),
            market("0x5", "USDC-B", 0.5, ("0xusdc-b", "USDC", "USD Coin")),
        ]
    }

    #[tokio::test]
    async fn fetches_markets_without_zero_address() {
        let mut client = MockSubgraphClient::new();
        client
            .expect_post_query()
            .withf(|document| {
                document.contains(
                    "markets(first: 100, where: {id_not: \"0x0000000000000000000000000000000000000000\"})",
                ) && document.contains("inputToken {")
            })
            .returning(|_| {
                Ok(json!({
                    "markets": [{
                        "id": "0x1",
                        "name": "ETH-A",
                        "totalValueLockedUSD": "600",
                        "inputToken": {"id": "0xweth", "symbol": "WETH", "name": "Wrapped Ether"}
                    }]
                }))
            });

        let markets = fetch_markets(&client, 100).await.unwrap();

        assert_eq!(
            markets,
            vec![market(
                "0x1",
                "ETH-A",
                600.0,
                ("0xweth", "WETH", "Wrapped Ether")
            )]
        );
    }

    #[test]
    fn top_markets_largest_first() {
        let top = top_markets_by_tvl(&markets(), 2);

        let names: Vec<&str> = top.iter().map(|market| market.name.as_str()).collect();
        assert_eq!(names, vec!["ETH-A", "ETH-B"]);
    }

    #[test]
    fn asset_tvl_sums_per_token() {
        let assets = asset_tvl(&markets());

        assert_eq!(
            assets,
            vec![
                AssetTvl {
                    token_id: "0xlp".to_string(),
                    token: "UNIV2DAIETH".to_string(),
                    total_value_locked_usd: 50.0,
                },
                AssetTvl {
                    token_id: "0xusdc".to_string(),
                    token: "USDC".to_string(),
                    total_value_locked_usd: 150.0,
                },
                AssetTvl {
                    token_id: "0xweth".to_string(),
                    token: "WETH".to_string(),
                    total_value_locked_usd: 800.0,
                },
            ]
        );
    }

    #[test]
    fn stable_share_of_collateral() {
        let split = collateral_split(&asset_tvl(&markets()));

        let types: Vec<&str> = split
            .iter()
            .map(|part| part.collateral_type.as_str())
            .collect();
        assert_eq!(types, vec!["STABLE", "NON-STABLE"]);
        assert!((split[0].ratio - 0.15).abs() < 1e-12);
        assert!((split[1].ratio - 0.85).abs() < 1e-12);
    }

    #[test]
    fn no_tvl_has_no_ratio() {
        assert_eq!(stable_ratio(&[]), None);
        assert!(collateral_split(&[]).is_empty());
    }
}
