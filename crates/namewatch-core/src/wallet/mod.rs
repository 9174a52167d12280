//! Wallet-capable action layer.
//!
//! The agent owns one local EVM key. Its exported state is persisted to a
//! single sealed file (see [`vault`]) that is read once at construction and
//! rewritten after the agent has been built successfully.

pub mod rpc;
pub mod vault;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use alloy::primitives::{hex, utils::format_ether, Address, U256};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use rand::RngCore;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::WalletConfig;
use rpc::EvmRpc;
use vault::Vault;

/// Public JSON-RPC endpoint for the networks we know about.
pub fn default_rpc_url(network_id: &str) -> Option<&'static str> {
    match network_id {
        "base-sepolia" => Some("https://sepolia.base.org"),
        "base-mainnet" => Some("https://mainnet.base.org"),
        "ethereum-sepolia" => Some("https://ethereum-sepolia-rpc.publicnode.com"),
        "ethereum-mainnet" => Some("https://ethereum-rpc.publicnode.com"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedWallet {
    pub address: String,
    pub network_id: String,
    pub private_key: String,
}

/// Balance snapshot returned to callers and tools.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub address: String,
    pub network_id: String,
    pub wei: String,
    pub ether: String,
}

/// Reads and writes the sealed wallet-state file.
pub struct WalletStore {
    path: PathBuf,
    vault: Vault,
}

impl WalletStore {
    pub fn new(path: impl Into<PathBuf>, secret: &str) -> Self {
        Self {
            path: path.into(),
            vault: Vault::from_secret(secret),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when no state has been persisted yet.
    pub fn load(&self) -> Result<Option<ExportedWallet>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let bytes = self
            .vault
            .open(&raw)
            .with_context(|| format!("Failed to unseal {}", self.path.display()))?;
        let exported = serde_json::from_slice(&bytes)
            .with_context(|| format!("{} does not hold wallet state", self.path.display()))?;
        Ok(Some(exported))
    }

    pub fn save(&self, exported: &ExportedWallet) -> Result<()> {
        let json = serde_json::to_vec(exported)?;
        let sealed = self.vault.seal(&json)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, sealed)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

pub struct WalletProvider {
    signer: PrivateKeySigner,
    network_id: String,
    rpc: EvmRpc,
    store: WalletStore,
}

impl WalletProvider {
    /// Import the persisted wallet if there is one, otherwise generate a
    /// fresh key. Nothing is written here; call [`persist`](Self::persist)
    /// once the wallet is in use.
    pub fn load_or_create(config: &WalletConfig, client: Client) -> Result<Self> {
        let rpc_url = match config.rpc_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => url.to_string(),
            None => default_rpc_url(&config.network_id)
                .with_context(|| {
                    format!(
                        "No RPC URL known for network '{}'; set wallet.rpcUrl",
                        config.network_id
                    )
                })?
                .to_string(),
        };

        let store = WalletStore::new(config.data_path(), &config.api_key_private_key);
        let signer = match store.load()? {
            Some(exported) => {
                if exported.network_id != config.network_id {
                    warn!(
                        stored = %exported.network_id,
                        configured = %config.network_id,
                        "Persisted wallet belongs to another network, using configured network"
                    );
                }
                let signer = PrivateKeySigner::from_str(&exported.private_key)
                    .context("Persisted wallet holds an invalid private key")?;
                info!(address = %signer.address(), "Imported persisted wallet");
                signer
            }
            None => {
                let signer = generate_signer()?;
                info!(address = %signer.address(), "Created new wallet");
                signer
            }
        };

        Ok(Self {
            signer,
            network_id: config.network_id.clone(),
            rpc: EvmRpc::new(client, &rpc_url),
            store,
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    pub fn rpc_url(&self) -> &str {
        self.rpc.url()
    }

    pub fn export(&self) -> ExportedWallet {
        ExportedWallet {
            address: self.address().to_string(),
            network_id: self.network_id.clone(),
            private_key: hex::encode_prefixed(self.signer.to_bytes()),
        }
    }

    /// Overwrite the wallet-state file with the current export.
    pub fn persist(&self) -> Result<()> {
        self.store.save(&self.export())?;
        info!(path = %self.store.path().display(), "Persisted wallet state");
        Ok(())
    }

    /// Native balance of `address`, or of this wallet when `None`.
    pub async fn balance(&self, address: Option<Address>) -> Result<Balance> {
        let address = address.unwrap_or_else(|| self.address());
        let wei: U256 = self.rpc.balance(address).await?;
        Ok(Balance {
            address: address.to_string(),
            network_id: self.network_id.clone(),
            wei: wei.to_string(),
            ether: format_ether(wei),
        })
    }
}

fn generate_signer() -> Result<PrivateKeySigner> {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    PrivateKeySigner::from_slice(&bytes).context("Failed to derive a signing key")
}
