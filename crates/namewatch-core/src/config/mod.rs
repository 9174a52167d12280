//! Configuration module for namewatch.
//!
//! Loads typed configuration from `./namewatch.json` or
//! `~/.namewatch/config.json`, then applies environment overrides
//! (a `.env` file in the working directory is honoured).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Network used when `NETWORK_ID` is not set.
pub const DEFAULT_NETWORK_ID: &str = "base-sepolia";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub agent: AgentDefaults,
    pub wallet: WalletConfig,
    pub data: DataConfig,
}

impl Config {
    /// Load configuration.
    ///
    /// Priority:
    /// 1. local `namewatch.json` in the current directory
    /// 2. `~/.namewatch/config.json`
    /// 3. built-in defaults
    ///
    /// Environment variables are applied on top in every case.
    pub fn load() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let paths = [PathBuf::from("namewatch.json"), Self::default_path()];
        let mut config = Config::default();
        for path in paths {
            if path.exists() {
                tracing::debug!("Loading config from: {}", path.display());
                config = Self::load_from(&path)?;
                break;
            }
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific path (no environment overrides).
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Override fields from the environment. `lookup` is injected so tests
    /// don't have to mutate the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OPENAI_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = get("OPENAI_API_BASE") {
            self.llm.api_base = Some(v);
        }
        if let Some(v) = get("NAMEWATCH_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("CDP_API_KEY_NAME") {
            self.wallet.api_key_name = v;
        }
        if let Some(v) = get("CDP_API_KEY_PRIVATE_KEY") {
            tracing::info!("Using wallet provider key from environment variable");
            self.wallet.api_key_private_key = v;
        }
        if let Some(v) = get("NETWORK_ID") {
            self.wallet.network_id = v;
        }
        if let Some(v) = get("WALLET_DATA_FILE") {
            self.wallet.data_file = v;
        }
        if let Some(v) = get("REGISTRATIONS_API_URL") {
            self.data.registrations_url = v;
        }
        if let Some(v) = get("RECORDS_API_URL") {
            self.data.records_url = v;
        }
    }

    /// Get the default config file path (`~/.namewatch/config.json`).
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Get the default config directory path.
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".namewatch")
    }

    /// Write the default config template to disk.
    pub fn write_default_template() -> anyhow::Result<PathBuf> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = serde_json::json!({
            "llm": {
                "apiKey": "sk-YOUR_KEY_HERE",
                "model": "gpt-4o-mini"
            },
            "wallet": {
                "apiKeyName": "YOUR_CDP_KEY_NAME",
                "apiKeyPrivateKey": "YOUR_CDP_PRIVATE_KEY",
                "networkId": DEFAULT_NETWORK_ID
            },
            "data": {
                "registrationsUrl": "https://api.studio.thegraph.com/query/YOUR_SUBGRAPH"
            }
        });

        std::fs::write(&path, serde_json::to_string_pretty(&template)?)?;
        Ok(path)
    }

    /// Validate configuration and return actionable error messages.
    ///
    /// All problems are reported at once; any error is fatal at startup.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if is_missing(&self.llm.api_key) {
            errors.push("OPENAI_API_KEY is not set (llm.apiKey in config).".into());
        }
        if self.llm.model.is_empty() {
            errors.push("llm.model is empty. Specify a model name.".into());
        }
        if is_missing(&self.wallet.api_key_name) {
            errors.push("CDP_API_KEY_NAME is not set (wallet.apiKeyName in config).".into());
        }
        if is_missing(&self.wallet.api_key_private_key) {
            errors.push(
                "CDP_API_KEY_PRIVATE_KEY is not set (wallet.apiKeyPrivateKey in config).".into(),
            );
        }
        if is_missing(&self.data.registrations_url) {
            errors.push(
                "REGISTRATIONS_API_URL is not set (data.registrationsUrl in config).".into(),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Empty values and untouched template placeholders both count as missing.
fn is_missing(value: &str) -> bool {
    value.trim().is_empty() || value.contains("YOUR_")
}

// ── LLM Configuration ───────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmConfig {
    pub api_key: String,
    pub api_base: Option<String>,
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            model: "gpt-4o-mini".into(),
        }
    }
}

// ── Agent Configuration ─────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentDefaults {
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_tool_iterations: u32,
    pub autonomous_interval_secs: u64,
    /// Conversation threads kept in memory; the least recently used is
    /// dropped past this.
    pub max_threads: usize,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.2,
            max_tool_iterations: 10,
            autonomous_interval_secs: 10,
            max_threads: 256,
        }
    }
}

// ── Wallet Configuration ────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WalletConfig {
    pub api_key_name: String,
    pub api_key_private_key: String,
    pub network_id: String,
    /// JSON-RPC endpoint override for `network_id`.
    pub rpc_url: Option<String>,
    /// Where the exported wallet state is persisted.
    pub data_file: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            api_key_name: String::new(),
            api_key_private_key: String::new(),
            network_id: DEFAULT_NETWORK_ID.into(),
            rpc_url: None,
            data_file: "wallet_data.txt".into(),
        }
    }
}

impl WalletConfig {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_file)
    }
}

// ── Data API Configuration ──────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataConfig {
    /// GraphQL endpoint serving `nameRegistereds`.
    pub registrations_url: String,
    /// Base URL of the name/address record lookup API.
    pub records_url: String,
    pub request_timeout_secs: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            registrations_url: String::new(),
            records_url: "https://api.ensdata.net".into(),
            request_timeout_secs: 30,
        }
    }
}

impl DataConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn complete() -> Config {
        let json = r#"{
            "llm": {"apiKey": "sk-abc123"},
            "wallet": {"apiKeyName": "organizations/1/apiKeys/2", "apiKeyPrivateKey": "secret"},
            "data": {"registrationsUrl": "https://example.org/subgraph"}
        }"#;
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.wallet.network_id, "base-sepolia");
        assert_eq!(config.data.request_timeout_secs, 30);
        assert_eq!(config.agent.autonomous_interval_secs, 10);
    }

    #[test]
    fn test_validate_passes_with_complete_config() {
        assert!(complete().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_every_missing_setting() {
        let errors = Config::default().validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("OPENAI_API_KEY")));
        assert!(errors.iter().any(|e| e.contains("CDP_API_KEY_NAME")));
        assert!(errors.iter().any(|e| e.contains("CDP_API_KEY_PRIVATE_KEY")));
        assert!(errors.iter().any(|e| e.contains("REGISTRATIONS_API_URL")));
    }

    #[test]
    fn test_validate_catches_placeholder_key() {
        let mut config = complete();
        config.llm.api_key = "sk-YOUR_KEY_HERE".into();
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("OPENAI_API_KEY")));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-from-env"),
            ("NETWORK_ID", "base-mainnet"),
            ("REGISTRATIONS_API_URL", "https://env.example/graphql"),
            ("RECORDS_API_URL", ""),
        ]);
        let mut config = complete();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key, "sk-from-env");
        assert_eq!(config.wallet.network_id, "base-mainnet");
        assert_eq!(config.data.registrations_url, "https://env.example/graphql");
        // Blank variables don't clobber configured values.
        assert_eq!(config.data.records_url, "https://api.ensdata.net");
    }

    #[test]
    fn test_network_defaults_to_testnet_when_unset() {
        let mut config = complete();
        config.apply_env(|_| None);
        assert_eq!(config.wallet.network_id, DEFAULT_NETWORK_ID);
    }
}
