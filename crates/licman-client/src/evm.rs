//! # EVM JSON-RPC Ledger
//!
//! [`Ledger`] implementation that talks to the license contract on an
//! EVM-compatible node.
//!
//! ## How It Works
//!
//! 1. Reads are `eth_call` against the latest block, retried on transport
//!    failure.
//! 2. Writes are `eth_sendTransaction`. The node signs for the `from`
//!    account, so it must be one of the node's unlocked accounts (a local
//!    development node exposes these via `eth_accounts`).
//! 3. Confirmation polls `eth_getTransactionReceipt`. A null receipt means
//!    the transaction is still pending; status `0x1` means success.
//!
//! ## Security
//!
//! This client never holds private keys.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use licman_core::{Address, LicenseApplication, LicenseId, LicenseRecord, LicenseStatus};
use serde_json::{json, Value};

use crate::abi;
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::ledger::{Ledger, TxHash, TxReceipt};
use crate::retry::Backoff;

/// JSON-RPC client for the license contract.
#[derive(Debug)]
pub struct EvmLedger {
    client: reqwest::Client,
    config: LedgerConfig,
    next_id: AtomicU64,
}

impl EvmLedger {
    /// Build a client from configuration.
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LedgerError::Http {
                method: "client_init".to_string(),
                source: e,
            })?;
        Ok(Self {
            client,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Send a JSON-RPC request and return the `result` field.
    ///
    /// `idempotent` requests are retried on transport errors.
    async fn rpc_call(
        &self,
        method: &str,
        params: Value,
        idempotent: bool,
    ) -> Result<Value, LedgerError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
        });
        let send = || self.client.post(self.config.rpc_url.clone()).json(&body).send();
        let result = if idempotent {
            Backoff::default().run(method, send).await
        } else {
            send().await
        };
        let resp = result.map_err(|e| LedgerError::Http {
            method: method.to_string(),
            source: e,
        })?;

        if !resp.status().is_success() {
            return Err(LedgerError::Status {
                method: method.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let json: Value = resp.json().await.map_err(|e| LedgerError::MalformedResponse {
            method: method.to_string(),
            reason: format!("invalid JSON: {e}"),
        })?;

        if let Some(error) = json.get("error") {
            return Err(LedgerError::Rpc {
                method: method.to_string(),
                code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown RPC error")
                    .to_string(),
            });
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| LedgerError::MalformedResponse {
                method: method.to_string(),
                reason: "missing 'result' field".to_string(),
            })
    }

    /// `eth_call` against the configured contract, returning raw bytes.
    async fn eth_call(&self, data: Vec<u8>) -> Result<Vec<u8>, LedgerError> {
        let contract = self.config.require_contract()?;
        let call = json!({ "to": contract.to_hex(), "data": abi::to_hex(&data) });
        let result = self
            .rpc_call("eth_call", json!([call, "latest"]), true)
            .await?;
        let hex = as_str("eth_call", &result)?;
        Ok(abi::from_hex(hex)?)
    }

    /// `eth_sendTransaction` from `from`. `to = None` creates a contract.
    async fn send_transaction(
        &self,
        from: Address,
        to: Option<Address>,
        data: Vec<u8>,
    ) -> Result<TxHash, LedgerError> {
        let mut tx = json!({ "from": from.to_hex(), "data": abi::to_hex(&data) });
        if let Some(to) = to {
            tx["to"] = json!(to.to_hex());
        }
        let result = self
            .rpc_call("eth_sendTransaction", json!([tx]), false)
            .await?;
        let hash = TxHash::parse(as_str("eth_sendTransaction", &result)?)?;
        tracing::info!(from = %from, tx = %hash, "transaction sent");
        Ok(hash)
    }

    /// Accounts the node signs for.
    pub async fn accounts(&self) -> Result<Vec<Address>, LedgerError> {
        let result = self.rpc_call("eth_accounts", json!([]), true).await?;
        let list = result
            .as_array()
            .ok_or_else(|| malformed("eth_accounts", "result is not an array"))?;
        list.iter()
            .map(|v| {
                let s = as_str("eth_accounts", v)?;
                Address::parse(s).map_err(|e| malformed("eth_accounts", &e.to_string()))
            })
            .collect()
    }

    /// Chain id reported by the node.
    pub async fn chain_id(&self) -> Result<u64, LedgerError> {
        let result = self.rpc_call("eth_chainId", json!([]), true).await?;
        parse_quantity("eth_chainId", &result)
    }

    /// Fail unless the node reports the configured chain id.
    pub async fn check_chain(&self) -> Result<(), LedgerError> {
        let actual = self.chain_id().await?;
        if actual != self.config.chain_id {
            return Err(malformed(
                "eth_chainId",
                &format!("expected chain {}, node reports {actual}", self.config.chain_id),
            ));
        }
        Ok(())
    }

    /// Send the contract creation transaction with `admin` as constructor
    /// argument.
    pub async fn deploy(
        &self,
        from: Address,
        bytecode: &[u8],
        admin: Address,
    ) -> Result<TxHash, LedgerError> {
        self.send_transaction(from, None, abi::deployment_code(bytecode, admin))
            .await
    }
}

impl Ledger for EvmLedger {
    async fn license_ids(&self) -> Result<Vec<LicenseId>, LedgerError> {
        let data = self
            .eth_call(abi::encode_call(abi::GET_ALL_LICENSE_IDS, &[]))
            .await?;
        Ok(abi::decode_license_ids(&data)?)
    }

    async fn license(&self, id: LicenseId) -> Result<LicenseRecord, LedgerError> {
        let data = self.eth_call(abi::license_call(id)).await?;
        // An unassigned id reads back as the zero record.
        if data.is_empty() || abi::Decoder::new(&data).uint(0)? != id.get() {
            return Err(LedgerError::NotFound(id));
        }
        Ok(abi::decode_license(&data)?)
    }

    async fn admin_address(&self) -> Result<Address, LedgerError> {
        let data = self
            .eth_call(abi::encode_call(abi::ADMIN_ADDRESS, &[]))
            .await?;
        Ok(abi::decode_admin(&data)?)
    }

    async fn submit_license(
        &self,
        from: Address,
        application: &LicenseApplication,
    ) -> Result<TxHash, LedgerError> {
        let contract = self.config.require_contract()?;
        self.send_transaction(from, Some(contract), abi::submit_license_call(application))
            .await
    }

    async fn review_license(
        &self,
        from: Address,
        id: LicenseId,
        status: LicenseStatus,
    ) -> Result<TxHash, LedgerError> {
        let contract = self.config.require_contract()?;
        self.send_transaction(from, Some(contract), abi::review_license_call(id, status))
            .await
    }

    async fn receipt(&self, tx: &TxHash) -> Result<Option<TxReceipt>, LedgerError> {
        const METHOD: &str = "eth_getTransactionReceipt";
        let receipt = self.rpc_call(METHOD, json!([tx.as_str()]), true).await?;
        if receipt.is_null() {
            return Ok(None);
        }
        let status = receipt
            .get("status")
            .ok_or_else(|| malformed(METHOD, "missing 'status'"))?;
        let block = receipt
            .get("blockNumber")
            .ok_or_else(|| malformed(METHOD, "missing 'blockNumber'"))?;
        let contract_address = match receipt.get("contractAddress") {
            Some(Value::String(s)) => {
                Some(Address::parse(s).map_err(|e| malformed(METHOD, &e.to_string()))?)
            }
            _ => None,
        };
        Ok(Some(TxReceipt {
            tx_hash: tx.clone(),
            block_number: parse_quantity(METHOD, block)?,
            succeeded: parse_quantity(METHOD, status)? == 1,
            contract_address,
        }))
    }
}

fn malformed(method: &str, reason: &str) -> LedgerError {
    LedgerError::MalformedResponse {
        method: method.to_string(),
        reason: reason.to_string(),
    }
}

fn as_str<'a>(method: &str, value: &'a Value) -> Result<&'a str, LedgerError> {
    value
        .as_str()
        .ok_or_else(|| malformed(method, &format!("expected string, got {value}")))
}

/// Parse a hex quantity (`0x1a`).
fn parse_quantity(method: &str, value: &Value) -> Result<u64, LedgerError> {
    let s = as_str(method, value)?;
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| malformed(method, &format!("quantity without 0x prefix: {s}")))?;
    u64::from_str_radix(digits, 16).map_err(|e| malformed(method, &format!("bad quantity {s}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_parsing() {
        assert_eq!(parse_quantity("m", &json!("0x1")).unwrap(), 1);
        assert_eq!(parse_quantity("m", &json!("0x7a69")).unwrap(), 31337);
        assert!(parse_quantity("m", &json!("12")).is_err());
        assert!(parse_quantity("m", &json!(12)).is_err());
        assert!(parse_quantity("m", &json!("0xzz")).is_err());
    }

    #[test]
    fn new_accepts_local_config() {
        let cfg = LedgerConfig::local("http://127.0.0.1:8545", None).unwrap();
        assert!(EvmLedger::new(cfg).is_ok());
    }
}
