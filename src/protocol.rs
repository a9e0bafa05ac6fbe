//! Protocol level daily snapshot collections. Lending and DEX subgraphs expose the same
//! collections with different fields.
use clap::ValueEnum;

use crate::subgraph::{FieldPathQuery, FilterOp, OrderDirection};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProtocolKind {
    Lending,
    Dex,
}

#[derive(Clone, Debug)]
pub struct DailySnapshotsRequest {
    pub kind: ProtocolKind,
    pub first: u32,
    /// Only snapshots strictly after this unix timestamp.
    pub since: Option<i64>,
}

impl DailySnapshotsRequest {
    pub fn new(kind: ProtocolKind, first: u32) -> Self {
        Self {
            kind,
            first,
            since: None,
        }
    }

    pub fn since(mut self, since: i64) -> Self {
        self.since = Some(since);
        self
    }

    /// Newest first, selecting `fields`.
    pub(crate) fn query(&self, collection: &str, fields: &[&str]) -> FieldPathQuery {
        let query = FieldPathQuery::new(collection)
            .first(self.first)
            .order_by("timestamp", OrderDirection::Desc);

        let query = match self.since {
            Some(since) => query.filter("timestamp", FilterOp::Gt, since),
            None => query,
        };

        fields.iter().fold(query, |query, field| query.select(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_filters_on_timestamp() {
        let query = DailySnapshotsRequest::new(ProtocolKind::Dex, 1000)
            .since(1641600000)
            .query("usageMetricsDailySnapshots", &["id"]);

        assert!(query.to_graphql().contains(
            "usageMetricsDailySnapshots(first: 1000, orderBy: timestamp, orderDirection: desc, where: {timestamp_gt: 1641600000})"
        ));
    }

    #[test]
    fn without_since_has_no_filter() {
        let query = DailySnapshotsRequest::new(ProtocolKind::Lending, 100)
            .query("financialsDailySnapshots", &["id"]);

        assert!(!query.to_graphql().contains("where"));
    }
}
