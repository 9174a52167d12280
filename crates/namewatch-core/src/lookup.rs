//! Name and address record lookup.
//!
//! A plain GET keyed by a name (`alice.base.eth`) or an address, returning
//! the record's textual attributes as JSON.

use reqwest::{Client, Url};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup query is empty")]
    EmptyQuery,

    #[error("invalid records API URL `{0}`")]
    BadBaseUrl(String),

    #[error("request to records API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("records API returned HTTP {status} for `{query}`")]
    Status { status: u16, query: String },

    #[error("records API returned invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

pub struct RecordLookup {
    client: Client,
    base_url: String,
}

impl RecordLookup {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, query: &str) -> Result<Url, LookupError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|_| LookupError::BadBaseUrl(self.base_url.clone()))?;
        url.path_segments_mut()
            .map_err(|_| LookupError::BadBaseUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push(query);
        Ok(url)
    }

    /// Look up the text records of a name or address.
    pub async fn lookup(&self, query: &str) -> Result<Value, LookupError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(LookupError::EmptyQuery);
        }

        let url = self.url_for(query)?;
        debug!(%url, "Looking up name records");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            error!(%status, query, "Records API returned an error");
            return Err(LookupError::Status {
                status: status.as_u16(),
                query: query.to_string(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
