//! Error types for the workflow layer.
//!
//! Every I/O failure names the step that failed and whether anything was
//! left behind: an uploaded document without a registration, or a sent
//! transaction whose outcome is unknown.

use std::fmt;
use std::time::Duration;

use licman_client::{ContentStoreError, LedgerError, TxHash};
use licman_core::{Address, ContentAddress, LicenseId, LicenseStatus, ValidationError};
use serde::Serialize;

/// Cache lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("license {0} is not in the cache")]
    NotFound(LicenseId),
}

/// A reconciliation pass could not start.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Without the identifier list nothing can be reconciled. The cache is
    /// left untouched.
    #[error("could not list license identifiers; cache unchanged: {0}")]
    IdsUnavailable(#[source] LedgerError),
}

/// One record that a reconciliation pass could not refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchWarning {
    pub id: LicenseId,
    pub reason: String,
}

impl fmt::Display for FetchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "license {}: {}", self.id, self.reason)
    }
}

/// Non-fatal outcome of a reconciliation pass in which some records could
/// not be fetched. Those entries keep their last-known data and are flagged
/// stale.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("reconciliation incomplete: {} record(s) kept stale data", .failures.len())]
pub struct PartialFailure {
    pub failures: Vec<FetchWarning>,
}

/// Submission failures, in workflow order.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// Bad input. Nothing was uploaded or sent.
    #[error("invalid submission: {0}")]
    Validation(#[from] ValidationError),

    /// The identity already has a submission running.
    #[error("a submission from {0} is already in progress")]
    AlreadyInProgress(Address),

    /// The document upload failed. Nothing was registered.
    #[error("document upload failed; nothing was registered: {0}")]
    Upload(#[source] ContentStoreError),

    /// The ledger rejected or reverted the registration. The document stays
    /// in the content store at `content_address`.
    #[error("document uploaded but registration failed (content address {content_address}): {source}")]
    Registration {
        content_address: ContentAddress,
        source: LedgerError,
    },

    /// The registration was sent but not confirmed in time. The record may
    /// still appear after a later reconciliation.
    #[error(
        "registration {tx_hash} not confirmed after {waited:?}; document uploaded \
         (content address {content_address}), record may still appear"
    )]
    ConfirmationTimeout {
        content_address: ContentAddress,
        tx_hash: TxHash,
        waited: Duration,
    },

    /// The registration confirmed but its record could not be located.
    #[error(
        "registration {tx_hash} confirmed but the new record could not be read \
         (content address {content_address})"
    )]
    Unresolved {
        content_address: ContentAddress,
        tx_hash: TxHash,
        source: Option<LedgerError>,
    },
}

/// Review failures.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("no connected account")]
    NotConnected,

    #[error("{identity} is not the administrator; record unchanged")]
    Unauthorized { identity: Address },

    #[error("license {0} is not known; reconcile before reviewing")]
    NotFound(LicenseId),

    #[error("license {id} is {status}, only PENDING licenses can be reviewed")]
    InvalidState { id: LicenseId, status: LicenseStatus },

    /// The review transaction was rejected or reverted. Record unchanged.
    #[error("review transaction failed; record unchanged: {0}")]
    Ledger(#[from] LedgerError),

    #[error("review {tx_hash} of license {id} not confirmed after {waited:?}; outcome unknown")]
    ConfirmationTimeout {
        id: LicenseId,
        tx_hash: TxHash,
        waited: Duration,
    },
}
