//! # Ledger Abstraction
//!
//! The operations the license workflow needs from the contract, independent
//! of transport. Reads return current ledger state. Writes return as soon as
//! the node accepts the transaction; callers confirm with
//! [`wait_for_confirmation`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

use licman_core::{Address, LicenseApplication, LicenseId, LicenseRecord, LicenseStatus};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Hash of a submitted transaction (`0x` + 64 hex digits, lowercase).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    /// Validate and normalize a transaction hash.
    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        let digits = s.strip_prefix("0x").unwrap_or("");
        if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LedgerError::MalformedResponse {
                method: "eth_sendTransaction".to_string(),
                reason: format!("not a transaction hash: {s:?}"),
            });
        }
        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// Receipt status `0x1`.
    pub succeeded: bool,
    /// Set for contract creation transactions.
    pub contract_address: Option<Address>,
}

/// Access to the license contract.
///
/// Implementations must be cheap to share across tasks; the sync layer
/// holds one behind an `Arc` and issues concurrent reads.
pub trait Ledger: Send + Sync {
    /// All license identifiers, in registration order.
    fn license_ids(&self) -> impl Future<Output = Result<Vec<LicenseId>, LedgerError>> + Send;

    /// Current state of one record. `NotFound` if the id was never assigned.
    fn license(
        &self,
        id: LicenseId,
    ) -> impl Future<Output = Result<LicenseRecord, LedgerError>> + Send;

    /// The administrator account fixed at deployment.
    fn admin_address(&self) -> impl Future<Output = Result<Address, LedgerError>> + Send;

    /// Send `submitLicense` from `from`.
    fn submit_license(
        &self,
        from: Address,
        application: &LicenseApplication,
    ) -> impl Future<Output = Result<TxHash, LedgerError>> + Send;

    /// Send `reviewLicense` from `from`.
    fn review_license(
        &self,
        from: Address,
        id: LicenseId,
        status: LicenseStatus,
    ) -> impl Future<Output = Result<TxHash, LedgerError>> + Send;

    /// Receipt of a transaction, or `None` while it is unmined.
    fn receipt(
        &self,
        tx: &TxHash,
    ) -> impl Future<Output = Result<Option<TxReceipt>, LedgerError>> + Send;
}

/// Poll for a receipt until the transaction is mined.
///
/// Returns `Reverted` for a mined failure. Never gives up on its own; wrap
/// in `tokio::time::timeout` to bound the wait.
pub async fn wait_for_confirmation<L: Ledger + ?Sized>(
    ledger: &L,
    tx: &TxHash,
    poll_interval: Duration,
) -> Result<TxReceipt, LedgerError> {
    loop {
        match ledger.receipt(tx).await? {
            Some(receipt) if receipt.succeeded => {
                tracing::debug!(tx = %tx, block = receipt.block_number, "transaction confirmed");
                return Ok(receipt);
            }
            Some(_) => {
                return Err(LedgerError::Reverted {
                    tx_hash: tx.to_string(),
                })
            }
            None => tokio::time::sleep(poll_interval).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_hash_normalizes_case() {
        let raw = format!("0x{}", "AB".repeat(32));
        let tx = TxHash::parse(&raw).unwrap();
        assert_eq!(tx.as_str(), format!("0x{}", "ab".repeat(32)));
    }

    #[test]
    fn tx_hash_rejects_malformed() {
        assert!(TxHash::parse("0x1234").is_err());
        assert!(TxHash::parse(&"ab".repeat(32)).is_err());
        assert!(TxHash::parse(&format!("0x{}", "zz".repeat(32))).is_err());
    }
}
