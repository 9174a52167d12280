//! GraphQL page source for `nameRegistereds` events.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::paginate::{PageSource, QueryShape, PAGE_SIZE};
use super::{FetchError, FetchWindow};

const FULL_FIELDS: &str = "id name owner transactionHash blockNumber blockTimestamp";
const ID_FIELDS: &str = "id";

/// Talks to a subgraph endpoint over HTTP POST.
pub struct SubgraphSource {
    client: Client,
    endpoint: String,
}

impl SubgraphSource {
    pub fn new(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }

    /// Build the GraphQL document for a query shape.
    pub fn query(shape: QueryShape) -> String {
        let fields = match shape {
            QueryShape::Full => FULL_FIELDS,
            QueryShape::IdsOnly => ID_FIELDS,
        };
        format!(
            "query RecentRegistrations($targetTimestamp: BigInt!, $skip: Int!) {{ \
             nameRegistereds(first: {PAGE_SIZE}, skip: $skip, orderBy: blockNumber, \
             orderDirection: desc, where: {{ blockTimestamp_gte: $targetTimestamp }}) \
             {{ {fields} }} }}"
        )
    }

    fn request_body(shape: QueryShape, window: FetchWindow) -> Value {
        json!({
            "query": Self::query(shape),
            "variables": window,
        })
    }
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<RegistrationsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationsData {
    name_registereds: Vec<Value>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[async_trait]
impl PageSource for SubgraphSource {
    async fn fetch_page(
        &self,
        shape: QueryShape,
        window: FetchWindow,
    ) -> Result<Vec<Value>, FetchError> {
        debug!(endpoint = %self.endpoint, skip = window.skip, ?shape, "Requesting registrations page");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&Self::request_body(shape, window))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GraphQlResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        if !parsed.errors.is_empty() {
            let messages: Vec<String> = parsed.errors.into_iter().map(|e| e.message).collect();
            return Err(FetchError::Query(messages.join("; ")));
        }

        parsed
            .data
            .map(|d| d.name_registereds)
            .ok_or_else(|| FetchError::Decode("response has no `data`".into()))
    }
}
