//! # licman-state: License Review State Machine
//!
//! The ledger is the only authority on license state, but every local
//! component still needs the same rules: what a reviewer may do to a record,
//! what a well-formed record looks like, and whether a freshly read record
//! is a legal successor of the copy already held in memory.
//!
//! ## State Machine
//!
//! - **License** (`license.rs`): `Pending → Approved | Rejected`. Once a
//!   record leaves `Pending` it carries a reviewer and never changes again.

pub mod license;

pub use license::{
    check_record, check_successor, review, LicenseError, ReviewDecision, ReviewTransition,
};
