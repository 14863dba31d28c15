//! Configuration management for the campaign gateway
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use ethers::types::Address;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub network: NetworkConfig,
    pub contract: ContractConfig,
    pub wallet: WalletConfig,
    pub gas: GasConfig,
    pub broadcast: BroadcastConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    /// Queried from the node when absent
    pub chain_id: Option<u64>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractConfig {
    pub address: String,
    /// Hardhat artifact or bare ABI JSON. The built-in Crowdfunding interface is
    /// used when absent.
    pub abi_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Name of the environment variable holding the hex-encoded signing key
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GasConfig {
    /// Upper bound for any gas limit, normally the network's block gas limit
    #[serde(default = "default_max_gas_limit")]
    pub max_gas_limit: u64,
    pub limit: GasLimitPolicy,
    pub fees: FeePolicy,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum GasLimitPolicy {
    Fixed {
        value: u64,
    },
    Estimate {
        #[serde(default = "default_gas_limit_buffer_percent")]
        buffer_percent: u64,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FeePolicy {
    /// Wei values used as-is
    Fixed {
        max_fee_per_gas: u64,
        max_priority_fee_per_gas: u64,
    },
    /// Derived from the latest block's base fee
    Network {
        priority_fee_gwei: u64,
        max_fee_cap_gwei: u64,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastConfig {
    pub receipt_timeout_secs: u64,
    pub poll_interval_ms: u64,
    #[serde(default = "default_serialize_per_account")]
    pub serialize_per_account: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_private_key_env() -> String {
    "CROWDFUND_PRIVATE_KEY".to_string()
}

fn default_max_gas_limit() -> u64 {
    30_000_000
}

fn default_gas_limit_buffer_percent() -> u64 {
    20
}

fn default_serialize_per_account() -> bool {
    true
}

impl Settings {
    /// Load settings from the file named by `CROWDFUND_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("CROWDFUND_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::from_path(&config_path)
    }

    pub fn from_path(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml_str(&config_str)
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(input);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.network.rpc_url.trim().is_empty() {
            anyhow::bail!("network.rpc_url must be set");
        }
        if self.network.request_timeout_secs == 0 {
            anyhow::bail!("network.request_timeout_secs must be positive");
        }

        self.contract_address()?;

        if self.gas.max_gas_limit == 0 {
            anyhow::bail!("gas.max_gas_limit must be positive");
        }

        match self.gas.limit {
            GasLimitPolicy::Fixed { value } => {
                if value == 0 || value > self.gas.max_gas_limit {
                    anyhow::bail!(
                        "gas.limit value {} must be within 1..={}",
                        value,
                        self.gas.max_gas_limit
                    );
                }
            }
            GasLimitPolicy::Estimate { buffer_percent } => {
                if buffer_percent > 100 {
                    tracing::warn!("gas.limit buffer of {}% is unusually large", buffer_percent);
                }
            }
        }

        match self.gas.fees {
            FeePolicy::Fixed {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                if max_fee_per_gas == 0 || max_priority_fee_per_gas == 0 {
                    anyhow::bail!("gas.fees values must be positive");
                }
                if max_priority_fee_per_gas > max_fee_per_gas {
                    anyhow::bail!("gas.fees priority fee exceeds max fee per gas");
                }
            }
            FeePolicy::Network {
                priority_fee_gwei,
                max_fee_cap_gwei,
            } => {
                if priority_fee_gwei == 0 || max_fee_cap_gwei < priority_fee_gwei {
                    anyhow::bail!("gas.fees requires 0 < priority_fee_gwei <= max_fee_cap_gwei");
                }
            }
        }

        if self.broadcast.receipt_timeout_secs == 0 || self.broadcast.poll_interval_ms == 0 {
            anyhow::bail!("broadcast timeouts must be positive");
        }

        Ok(())
    }

    /// Deployed contract address
    pub fn contract_address(&self) -> Result<Address> {
        self.contract
            .address
            .trim()
            .parse::<Address>()
            .with_context(|| format!("Invalid contract address: {}", self.contract.address))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.request_timeout_secs)
    }
}

impl BroadcastConfig {
    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
