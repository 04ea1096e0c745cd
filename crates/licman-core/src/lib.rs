//! # licman-core: Foundational Types
//!
//! Domain primitives shared by every other licman crate. It depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for ledger primitives.** `Address`, `LicenseId`,
//!    `ContentAddress` are newtypes with validated constructors. No bare
//!    strings for identities or document references.
//!
//! 2. **Case-insensitive identity by construction.** `Address` stores the raw
//!    20 bytes, so two spellings of the same account that differ only in hex
//!    case compare equal without any string folding at call sites.
//!
//! 3. **Zero sentinel stays at the edge.** The ledger reports an unreviewed
//!    record with the zero address as reviewer. `LicenseRecord` models that as
//!    `reviewer: None`; the sentinel only exists in the wire codec.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `licman-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod license;

pub use error::ValidationError;
pub use identity::{Address, ContentAddress, LicenseId};
pub use license::{LicenseApplication, LicenseRecord, LicenseStatus};
