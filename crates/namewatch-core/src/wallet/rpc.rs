//! Minimal EVM JSON-RPC client for read-only chain queries.

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

pub struct EvmRpc {
    client: Client,
    rpc_url: String,
}

impl EvmRpc {
    pub fn new(client: Client, rpc_url: &str) -> Self {
        Self {
            client,
            rpc_url: rpc_url.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.rpc_url
    }

    /// Execute a JSON-RPC call and return its `result` member.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        debug!(method, url = %self.rpc_url, "JSON-RPC call");

        let resp = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Network error calling {}", self.rpc_url))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("RPC endpoint returned HTTP {}", status);
        }

        let mut data: Value = resp.json().await.context("Failed to parse RPC response")?;

        if let Some(err) = data.get("error") {
            let msg = err["message"].as_str().unwrap_or("unknown RPC error");
            anyhow::bail!("RPC error: {}", msg);
        }

        match data.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => anyhow::bail!("RPC response has no result"),
        }
    }

    /// Native balance of `address` at the latest block, in wei.
    pub async fn balance(&self, address: Address) -> Result<U256> {
        let result = self
            .call("eth_getBalance", json!([address.to_string(), "latest"]))
            .await?;
        let hex = result
            .as_str()
            .context("eth_getBalance result is not a string")?;
        parse_quantity(hex)
    }
}

/// Parse a JSON-RPC hex quantity (`0x1a`).
fn parse_quantity(hex: &str) -> Result<U256> {
    let digits = hex
        .strip_prefix("0x")
        .with_context(|| format!("quantity `{}` lacks 0x prefix", hex))?;
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).with_context(|| format!("invalid quantity `{}`", hex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), U256::ZERO);
        assert_eq!(parse_quantity("0x").unwrap(), U256::ZERO);
        assert_eq!(
            parse_quantity("0xde0b6b3a7640000").unwrap(),
            U256::from(1_000_000_000_000_000_000u64)
        );
        assert!(parse_quantity("123").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[tokio::test]
    async fn test_balance_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/")
                    .body_includes("eth_getBalance")
                    .body_includes("latest");
                then.status(200)
                    .json_body(json!({ "jsonrpc": "2.0", "id": 1, "result": "0x2386f26fc10000" }));
            })
            .await;

        let rpc = EvmRpc::new(Client::new(), &server.url("/"));
        let wei = rpc.balance(Address::ZERO).await.unwrap();
        mock.assert_async().await;
        assert_eq!(wei, U256::from(10_000_000_000_000_000u64));
    }

    #[tokio::test]
    async fn test_rpc_error_member() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0", "id": 1,
                    "error": { "code": -32000, "message": "header not found" }
                }));
            })
            .await;

        let rpc = EvmRpc::new(Client::new(), &server.url("/"));
        let err = rpc.balance(Address::ZERO).await.unwrap_err();
        assert!(err.to_string().contains("header not found"));
    }
}
