//! Wallet tools: the agent's own address and native balances.

use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolArgs, ToolError};
use crate::wallet::WalletProvider;

// ── WalletDetailsTool ───────────────────────────────────────────────

pub struct WalletDetailsTool {
    wallet: Arc<WalletProvider>,
}

impl WalletDetailsTool {
    pub fn new(wallet: Arc<WalletProvider>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl Tool for WalletDetailsTool {
    fn name(&self) -> &str {
        "wallet_details"
    }

    fn description(&self) -> &str {
        "Get the agent's own wallet address and the network it operates on."
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: ToolArgs) -> Result<String, ToolError> {
        Ok(json!({
            "address": self.wallet.address().to_string(),
            "networkId": self.wallet.network_id(),
        })
        .to_string())
    }
}

// ── WalletBalanceTool ───────────────────────────────────────────────

pub struct WalletBalanceTool {
    wallet: Arc<WalletProvider>,
}

impl WalletBalanceTool {
    pub fn new(wallet: Arc<WalletProvider>) -> Self {
        Self { wallet }
    }
}

fn optional_address(args: &ToolArgs) -> Result<Option<Address>, ToolError> {
    match args.get("address").and_then(Value::as_str).map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Address::from_str(raw)
            .map(Some)
            .map_err(|e| ToolError::InvalidArgument {
                name: "address",
                reason: e.to_string(),
            }),
    }
}

#[async_trait]
impl Tool for WalletBalanceTool {
    fn name(&self) -> &str {
        "wallet_balance"
    }

    fn description(&self) -> &str {
        "Get the native (ETH) balance of an 0x address on the agent's network. \
         Omit the address to check the agent's own wallet."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "address": {
                    "type": "string",
                    "description": "0x-prefixed address; defaults to the agent wallet"
                }
            }
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let address = optional_address(&args)?;
        let balance = self.wallet.balance(address).await?;
        serde_json::to_string(&balance).map_err(|e| ToolError::Upstream(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WalletConfig;
    use httpmock::prelude::*;
    use reqwest::Client;

    fn wallet(rpc_url: &str) -> Arc<WalletProvider> {
        let config = WalletConfig {
            api_key_private_key: "k".into(),
            rpc_url: Some(rpc_url.into()),
            data_file: std::env::temp_dir()
                .join(format!("namewatch-tools-wallet-{}.txt", std::process::id()))
                .to_string_lossy()
                .into_owned(),
            ..WalletConfig::default()
        };
        Arc::new(WalletProvider::load_or_create(&config, Client::new()).unwrap())
    }

    #[tokio::test]
    async fn test_details_reports_address_and_network() {
        let wallet = wallet("http://127.0.0.1:9");
        let tool = WalletDetailsTool::new(wallet.clone());
        let out: Value = serde_json::from_str(&tool.execute(ToolArgs::new()).await.unwrap()).unwrap();
        assert_eq!(out["address"], wallet.address().to_string());
        assert_eq!(out["networkId"], "base-sepolia");
    }

    #[tokio::test]
    async fn test_balance_of_given_address() {
        let server = MockServer::start_async().await;
        let target = "0x000000000000000000000000000000000000dEaD";
        server
            .mock_async(|when, then| {
                when.method(POST).path("/").body_includes(target);
                then.status(200)
                    .json_body(json!({ "jsonrpc": "2.0", "id": 1, "result": "0x0" }));
            })
            .await;

        let tool = WalletBalanceTool::new(wallet(&server.url("/")));
        let mut args = ToolArgs::new();
        args.insert("address".into(), Value::String(target.into()));
        let out: Value = serde_json::from_str(&tool.execute(args).await.unwrap()).unwrap();
        assert_eq!(out["address"], target);
        assert_eq!(out["wei"], "0");
    }

    #[tokio::test]
    async fn test_bad_address_is_invalid_argument() {
        let tool = WalletBalanceTool::new(wallet("http://127.0.0.1:9"));
        let mut args = ToolArgs::new();
        args.insert("address".into(), Value::String("alice.base.eth".into()));
        let err = tool.execute(args).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { name: "address", .. }));
    }
}
