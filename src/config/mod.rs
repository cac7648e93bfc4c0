//! Configuration for the vault rebalancer
//!
//! Tunables come from an optional JSON file; endpoints, the registry id and
//! secrets come from environment variables, read once at process start.
//!
//! ```bash
//! export EXECUTOR_EOA_PRIVATE_KEY="0x..."
//! export EXECUTOR_REGISTRY_ID="..."
//! export JSON_RPC_URL="https://mainnet.base.org"
//! export CONSOLE_API_KEY="..."
//! export CONSOLE_BASE_URL="https://..."
//! export MORPHO_GRAPHQL_URL="https://blue-api.morpho.org/graphql"
//! ```

use crate::scheduler::PollPolicy;
use crate::{Error, Result};
use alloy::primitives::{address, Address};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable names
pub mod env_vars {
    pub const EXECUTOR_EOA_PRIVATE_KEY: &str = "EXECUTOR_EOA_PRIVATE_KEY";
    pub const EXECUTOR_REGISTRY_ID: &str = "EXECUTOR_REGISTRY_ID";
    pub const JSON_RPC_URL: &str = "JSON_RPC_URL";
    pub const CONSOLE_API_KEY: &str = "CONSOLE_API_KEY";
    pub const CONSOLE_BASE_URL: &str = "CONSOLE_BASE_URL";
    pub const MORPHO_GRAPHQL_URL: &str = "MORPHO_GRAPHQL_URL";
    pub const EXECUTOR_CLIENT_ID: &str = "EXECUTOR_CLIENT_ID";
}

/// Default Morpho Blue API endpoint
pub const DEFAULT_MORPHO_GRAPHQL_URL: &str = "https://blue-api.morpho.org/graphql";

/// Well-known console contracts
pub mod contracts {
    use super::*;

    /// Executor plugin, the EIP-712 verifying contract for executions
    pub const EXECUTOR_PLUGIN: Address = address!("b92929d03768a4f8d69552e15a8071eaf8e684ed");
    /// Safe MultiSend v1.4.1
    pub const MULTI_SEND: Address = address!("38869bf66a61cf6bdb996a6ae40d5853fd43b526");
    /// Console fee receiver; every executor policy must allow it as a hop
    pub const CONSOLE_FEE_RECEIVER: Address = address!("ef59f0ad1be369189e7dd30fb474263a87400c73");
}

/// Remote endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Chain JSON-RPC URL
    pub rpc_url: String,
    /// Console (vendor) API base URL
    pub console_base_url: String,
    /// Morpho GraphQL endpoint
    pub morpho_graphql_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            console_base_url: String::new(),
            morpho_graphql_url: DEFAULT_MORPHO_GRAPHQL_URL.to_string(),
        }
    }
}

/// Task polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Wait between cycles (milliseconds)
    pub interval_ms: u64,
    /// First task index fetched per cycle
    pub page_offset: u32,
    /// Maximum tasks fetched per cycle
    pub page_limit: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            page_offset: 0,
            page_limit: 10,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Workflow monitoring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Wait between workflow status polls (milliseconds)
    pub poll_interval_ms: u64,
    /// Give up monitoring after this many seconds (None = wait forever)
    pub timeout_secs: Option<u64>,
    /// Consecutive status fetch errors tolerated before failing
    pub max_consecutive_errors: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            timeout_secs: Some(600),
            max_consecutive_errors: 3,
        }
    }
}

impl WorkflowConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::every(Duration::from_millis(self.poll_interval_ms))
            .with_max_consecutive_errors(self.max_consecutive_errors)
            .with_timeout(self.timeout_secs.map(Duration::from_secs))
    }
}

/// Console contract addresses used when building executions
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractAddresses {
    pub executor_plugin: Address,
    pub multi_send: Address,
}

impl Default for ContractAddresses {
    fn default() -> Self {
        Self {
            executor_plugin: contracts::EXECUTOR_PLUGIN,
            multi_send: contracts::MULTI_SEND,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Task registry this executor serves
    pub registry_id: String,
    /// Remote endpoints
    pub endpoints: Endpoints,
    /// Task polling
    pub polling: PollingConfig,
    /// Workflow monitoring
    pub workflow: WorkflowConfig,
    /// Slippage tolerance for vault deposits/withdrawals (percent)
    pub slippage_percent: f64,
    /// Console contracts
    pub contracts: ContractAddresses,
    /// Submission journal (JSONL). None keeps the ledger in memory only.
    pub journal_path: Option<String>,
    /// Run eth_call against plain-call executables before signing
    pub simulate_before_submit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_id: String::new(),
            endpoints: Endpoints::default(),
            polling: PollingConfig::default(),
            workflow: WorkflowConfig::default(),
            slippage_percent: 2.0,
            contracts: ContractAddresses::default(),
            journal_path: Some("submissions.jsonl".to_string()),
            simulate_before_submit: false,
        }
    }
}

impl Config {
    /// Load from an optional JSON file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                serde_json::from_str(&content)
                    .map_err(|e| Error::Config(format!("Invalid config file: {}", e)))?
            }
            None => Config::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Override endpoints and registry id from a variable lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(id) = non_empty(env_vars::EXECUTOR_REGISTRY_ID) {
            self.registry_id = id;
        }
        if let Some(url) = non_empty(env_vars::JSON_RPC_URL) {
            self.endpoints.rpc_url = url;
        }
        if let Some(url) = non_empty(env_vars::CONSOLE_BASE_URL) {
            self.endpoints.console_base_url = url;
        }
        if let Some(url) = non_empty(env_vars::MORPHO_GRAPHQL_URL) {
            self.endpoints.morpho_graphql_url = url;
        }
    }

    /// Check that everything the polling loop needs is present
    pub fn validate(&self) -> Result<()> {
        if self.registry_id.is_empty() {
            return Err(Error::Config(format!(
                "{} is not set",
                env_vars::EXECUTOR_REGISTRY_ID
            )));
        }
        for (name, value) in [
            (env_vars::JSON_RPC_URL, &self.endpoints.rpc_url),
            (env_vars::CONSOLE_BASE_URL, &self.endpoints.console_base_url),
            (
                env_vars::MORPHO_GRAPHQL_URL,
                &self.endpoints.morpho_graphql_url,
            ),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::Config(format!("{} is invalid ({:?}): {}", name, value, e)))?;
        }
        if self.polling.interval_ms == 0 {
            return Err(Error::Config("polling.interval_ms must be > 0".to_string()));
        }
        if self.workflow.poll_interval_ms == 0 {
            return Err(Error::Config(
                "workflow.poll_interval_ms must be > 0".to_string(),
            ));
        }
        if self.polling.page_limit == 0 {
            return Err(Error::Config("polling.page_limit must be > 0".to_string()));
        }
        if !(0.0..=100.0).contains(&self.slippage_percent) {
            return Err(Error::Config(format!(
                "slippage_percent out of range: {}",
                self.slippage_percent
            )));
        }
        Ok(())
    }
}

/// Secrets, read from the environment only and never serialized
#[derive(Debug)]
pub struct Credentials {
    pub executor_key: SecretString,
    pub console_api_key: SecretString,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            executor_key: required_secret(&lookup, env_vars::EXECUTOR_EOA_PRIVATE_KEY)?,
            console_api_key: required_secret(&lookup, env_vars::CONSOLE_API_KEY)?,
        })
    }

    /// Only the console API key, for commands that never sign
    pub fn console_api_key_from_env() -> Result<SecretString> {
        Self::console_api_key_from_lookup(|name| std::env::var(name).ok())
    }

    pub fn console_api_key_from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<SecretString> {
        required_secret(&lookup, env_vars::CONSOLE_API_KEY)
    }
}

fn required_secret(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<SecretString> {
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
        .ok_or_else(|| Error::Config(format!("{} is not set", name)))
}
