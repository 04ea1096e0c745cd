//! # licman-sync: License Workflow Core
//!
//! Keeps a local, versioned view of the ledger's license records and runs
//! the two user workflows against it:
//!
//! - [`LicenseCache`] reconciles records from the ledger, tolerating
//!   per-record failures and out-of-order completion.
//! - [`SubmissionSequencer`] uploads a document then registers it, with
//!   one submission in flight per identity.
//! - [`projector`] derives the admin and submitter views and gates the
//!   review action on the administrator identity.
//! - [`Session`] carries the connected account explicitly; nothing here
//!   reads identity from global state.
//!
//! The ledger is the only source of truth. Everything in this crate can be
//! rebuilt by a reconciliation pass.

pub mod cache;
pub mod error;
pub mod projector;
pub mod sequencer;
pub mod session;

pub use cache::{ApplyOutcome, CacheEntry, CacheSnapshot, LicenseCache};
pub use error::{
    CacheError, FetchWarning, PartialFailure, ReconcileError, ReviewError, SubmissionError,
};
pub use projector::{authorize_review, project_admin_view, project_submitter_view, Reviewer};
pub use sequencer::{SubmissionDraft, SubmissionPhase, SubmissionSequencer};
pub use session::{Role, Session};
