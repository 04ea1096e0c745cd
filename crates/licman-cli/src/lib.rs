//! # licman-cli: Command-Line Client for the License Registry
//!
//! Provides the `licman` binary.
//!
//! ## Subcommands
//!
//! - `licman deploy`: Instantiate the license contract.
//! - `licman licenses`: The administrator dashboard or a submitter's history.
//! - `licman submit`: Upload a document and register an application.
//! - `licman review`: Approve or reject a pending application.
//! - `licman document`: Print a document's gateway link or download it.
//!
//! ```bash
//! export LICMAN_CONTRACT_ADDRESS=0x5fbdb2315678afecb367f032d93f642f64180aa3
//! licman submit --company-name "Acme Ltd" --company-address "1 Main St" --document doc.pdf
//! licman licenses --json
//! licman review --id 1 --approve
//! ```
//!
//! Diagnostics go to stderr; stdout carries only command output.

pub mod context;
pub mod deploy;
pub mod document;
pub mod licenses;
pub mod render;
pub mod review;
pub mod submit;
