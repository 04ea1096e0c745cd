//! Client configuration.
//!
//! Endpoints default to a local development node (JSON-RPC on 8545) and a
//! local IPFS daemon (API on 5001, gateway on 8081). Override via
//! environment variables or explicit construction.

use std::time::Duration;

use licman_core::Address;
use url::Url;

/// How long to wait for a submitted transaction to be mined, and how often
/// to ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    /// Upper bound on the wait before giving up with a timeout.
    pub timeout: Duration,
    /// Delay between receipt polls.
    pub poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Configuration for the ledger JSON-RPC client.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint.
    pub rpc_url: Url,
    /// License contract. `None` is only valid for deployment.
    pub contract_address: Option<Address>,
    /// Expected chain id (checked on connect).
    pub chain_id: u64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Confirmation wait policy.
    pub confirmation: ConfirmationPolicy,
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `LICMAN_RPC_URL` (default: `http://127.0.0.1:8545`)
    /// - `LICMAN_CONTRACT_ADDRESS` (optional here; required by contract calls)
    /// - `LICMAN_CHAIN_ID` (default: 31337)
    /// - `LICMAN_RPC_TIMEOUT_SECS` (default: 30)
    /// - `LICMAN_CONFIRMATION_TIMEOUT_SECS` (default: 120)
    /// - `LICMAN_POLL_INTERVAL_MS` (default: 500)
    pub fn from_env() -> Result<Self, ConfigError> {
        let contract_address = match std::env::var("LICMAN_CONTRACT_ADDRESS") {
            Ok(raw) => Some(parse_address("LICMAN_CONTRACT_ADDRESS", &raw)?),
            Err(_) => None,
        };
        let defaults = ConfirmationPolicy::default();
        Ok(Self {
            rpc_url: env_url("LICMAN_RPC_URL", "http://127.0.0.1:8545")?,
            contract_address,
            chain_id: env_number("LICMAN_CHAIN_ID", 31337)?,
            timeout_secs: env_number("LICMAN_RPC_TIMEOUT_SECS", 30)?,
            confirmation: ConfirmationPolicy {
                timeout: Duration::from_secs(env_number(
                    "LICMAN_CONFIRMATION_TIMEOUT_SECS",
                    defaults.timeout.as_secs(),
                )?),
                poll_interval: Duration::from_millis(env_number(
                    "LICMAN_POLL_INTERVAL_MS",
                    defaults.poll_interval.as_millis() as u64,
                )?),
            },
        })
    }

    /// Configuration for a local node at `rpc_url` (for tests).
    pub fn local(rpc_url: &str, contract_address: Option<Address>) -> Result<Self, ConfigError> {
        Ok(Self {
            rpc_url: Url::parse(rpc_url)
                .map_err(|e| ConfigError::InvalidUrl("rpc_url".to_string(), e.to_string()))?,
            contract_address,
            chain_id: 31337,
            timeout_secs: 5,
            confirmation: ConfirmationPolicy {
                timeout: Duration::from_secs(5),
                poll_interval: Duration::from_millis(10),
            },
        })
    }

    /// The contract address, or an error naming the missing variable.
    pub fn require_contract(&self) -> Result<Address, ConfigError> {
        self.contract_address
            .ok_or_else(|| ConfigError::MissingVar("LICMAN_CONTRACT_ADDRESS".to_string()))
    }
}

/// Configuration for the IPFS content store.
#[derive(Debug, Clone)]
pub struct ContentStoreConfig {
    /// IPFS HTTP API base (uploads).
    pub api_url: Url,
    /// IPFS gateway base (downloads and display links).
    pub gateway_url: Url,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl ContentStoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `LICMAN_IPFS_API_URL` (default: `http://127.0.0.1:5001`)
    /// - `LICMAN_IPFS_GATEWAY_URL` (default: `http://127.0.0.1:8081`)
    /// - `LICMAN_IPFS_TIMEOUT_SECS` (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: env_url("LICMAN_IPFS_API_URL", "http://127.0.0.1:5001")?,
            gateway_url: env_url("LICMAN_IPFS_GATEWAY_URL", "http://127.0.0.1:8081")?,
            timeout_secs: env_number("LICMAN_IPFS_TIMEOUT_SECS", 60)?,
        })
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

fn env_number(var: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(var.to_string(), raw)),
        Err(_) => Ok(default),
    }
}

fn parse_address(var: &str, raw: &str) -> Result<Address, ConfigError> {
    Address::parse(raw).map_err(|e| ConfigError::InvalidAddress(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingVar(String),
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid address for {0}: {1}")]
    InvalidAddress(String, String),
    #[error("invalid number for {0}: {1:?}")]
    InvalidNumber(String, String),
}
