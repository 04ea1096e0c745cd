//! # Validation Errors
//!
//! Input problems detected locally, before any I/O is attempted.

use thiserror::Error;

/// Rejected input. Always raised before contacting the ledger or the
/// content store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Company name is empty or whitespace.
    #[error("company name is required")]
    EmptyCompanyName,

    /// Company address is empty or whitespace.
    #[error("company address is required")]
    EmptyCompanyAddress,

    /// No document was selected for upload.
    #[error("a document must be selected")]
    MissingDocument,

    /// No signer is connected to the session.
    #[error("no account is connected")]
    NotConnected,

    /// Text is not a 0x-prefixed 20-byte hex account address.
    #[error("invalid account address {0:?}")]
    InvalidAddress(String),

    /// Text is not a usable content address.
    #[error("invalid content address {0:?}")]
    InvalidContentAddress(String),

    /// Status code outside the 0/1/2 range reported by the ledger.
    #[error("unknown license status code {0}")]
    UnknownStatus(u8),
}
