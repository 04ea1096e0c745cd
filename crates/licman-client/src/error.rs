//! Client error types.

use licman_core::LicenseId;

use crate::abi::AbiError;
use crate::config::ConfigError;

/// Errors from ledger reads, writes, and confirmation polling.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// HTTP transport error.
    #[error("HTTP error calling {method}: {source}")]
    Http {
        method: String,
        source: reqwest::Error,
    },
    /// The endpoint answered with a non-2xx status.
    #[error("ledger endpoint returned {status} for {method}")]
    Status { method: String, status: u16 },
    /// The node returned a JSON-RPC error object: reverted preconditions,
    /// declined signatures, insufficient gas.
    #[error("{method} failed (code {code}): {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },
    /// The response was not shaped the way the method requires.
    #[error("malformed response to {method}: {reason}")]
    MalformedResponse { method: String, reason: String },
    /// A mined transaction reported failure status.
    #[error("transaction {tx_hash} was mined but reverted")]
    Reverted { tx_hash: String },
    /// Contract return data could not be decoded.
    #[error("ABI decoding failed: {0}")]
    Abi(#[from] AbiError),
    /// The ledger holds no record with this identifier.
    #[error("license {0} does not exist on the ledger")]
    NotFound(LicenseId),
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors from the content-addressed document store.
#[derive(Debug, thiserror::Error)]
pub enum ContentStoreError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The store answered with a non-2xx status.
    #[error("content store {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// The response could not be interpreted.
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },
    /// No document exists at the requested address.
    #[error("no document stored at {0}")]
    NotFound(String),
    /// The reference cannot be placed in a gateway URL.
    #[error("document reference {0:?} cannot be resolved through the gateway")]
    Unaddressable(String),
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
