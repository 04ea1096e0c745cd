//! # licman-client: Ledger and Content Store Clients
//!
//! Typed access to the two external collaborators of the license workflow:
//! - **Ledger**: the license contract, reached over EVM JSON-RPC
//!   (`eth_call` for reads, `eth_sendTransaction` for writes, receipts for
//!   confirmation).
//! - **Content store**: IPFS, reached over its HTTP API for uploads and its
//!   gateway for retrieval and display links.
//!
//! ## Architecture
//!
//! Both collaborators sit behind traits ([`Ledger`], [`ContentStore`]) so the
//! sync layer never performs I/O directly. Production implementations are
//! [`EvmLedger`] and [`IpfsContentStore`]; [`memory`] provides in-process
//! implementations with failure injection for development and tests.
//!
//! ## Retry Policy
//!
//! Read-only RPC calls retry on transport errors with exponential backoff.
//! Transactions and uploads are sent exactly once. Resubmitting a write is
//! a caller decision because a repeated registration would create a second
//! record.

pub mod abi;
pub mod config;
pub mod content;
pub mod error;
pub mod evm;
pub mod ledger;
pub mod memory;
pub(crate) mod retry;

pub use config::{ConfigError, ConfirmationPolicy, ContentStoreConfig, LedgerConfig};
pub use content::{ContentStore, Document, IpfsContentStore};
pub use error::{ContentStoreError, LedgerError};
pub use evm::EvmLedger;
pub use ledger::{wait_for_confirmation, Ledger, TxHash, TxReceipt};
