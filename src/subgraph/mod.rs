//! Talks to subgraph GraphQL endpoints. Queries are built as [`FieldPathQuery`] and their results
//! come back as a [`RawQueryTable`], the only place column names are built from strings.
mod flatten;
mod query;
mod row;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::table::{RawQueryTable, TableError};

pub use flatten::flatten_response;
pub use query::{FieldPathQuery, Filter, FilterOp, OrderDirection};
pub use row::EntityRow;

#[derive(Debug, Error)]
pub enum SubgraphError {
    #[error("subgraph request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("subgraph returned errors: {0}")]
    GraphQl(String),
    #[error("subgraph response has no data for {0}")]
    MissingData(String),
    #[error(transparent)]
    Table(#[from] TableError),
}

#[automock]
#[async_trait]
pub trait SubgraphClient {
    /// Sends a GraphQL document, returns the `data` object of the response.
    async fn post_query(&self, query: &str) -> Result<Value, SubgraphError>;
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlErrorMessage>,
}

/// One client per endpoint, reused for every query against it.
pub struct SubgraphHttp {
    url: String,
    client: reqwest::Client,
}

impl SubgraphHttp {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SubgraphClient for SubgraphHttp {
    async fn post_query(&self, query: &str) -> Result<Value, SubgraphError> {
        let response = self
            .client
            .post(&self.url)
            .json(&GraphQlRequest { query })
            .send()
            .await?
            .error_for_status()?
            .json::<GraphQlResponse>()
            .await?;

        if !response.errors.is_empty() {
            let messages = response
                .errors
                .into_iter()
                .map(|error| error.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SubgraphError::GraphQl(messages));
        }

        response
            .data
            .ok_or_else(|| SubgraphError::MissingData("data".to_string()))
    }
}

/// Runs `query` and flattens the result into one row per (entity, list element).
#[tracing::instrument(skip_all, fields(collection = %query.collection))]
pub async fn query_table(
    client: &impl SubgraphClient,
    query: &FieldPathQuery,
) -> Result<RawQueryTable, SubgraphError> {
    let document = query.to_graphql();
    debug!(%document, "querying subgraph");

    let data = client.post_query(&document).await?;
    let table = flatten_response(query, &data)?;

    if table.is_empty() {
        info!("subgraph query returned no rows");
    } else {
        debug!(rows = table.len(), "subgraph query returned rows");
    }

    Ok(table)
}
