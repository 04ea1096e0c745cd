//! # License Records
//!
//! The record shape held by the ledger, plus the application payload a
//! submitter sends to create one.
//!
//! ```text
//! Pending ──▶ Approved (terminal)
//!    │
//!    └─────▶ Rejected (terminal)
//! ```
//!
//! Transition rules live in `licman-state`; this module only defines data.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::{Address, ContentAddress, LicenseId};

/// Review status of a license, with the ledger's numeric encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseStatus {
    /// Submitted, awaiting an administrator decision.
    Pending,
    /// Approved by the administrator (terminal).
    Approved,
    /// Rejected by the administrator (terminal).
    Rejected,
}

impl LicenseStatus {
    /// Decode the ledger's status code (0, 1, 2).
    pub fn from_code(code: u8) -> Result<Self, ValidationError> {
        match code {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Approved),
            2 => Ok(Self::Rejected),
            other => Err(ValidationError::UnknownStatus(other)),
        }
    }

    /// The ledger's status code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Approved => 1,
            Self::Rejected => 2,
        }
    }

    /// Whether a reviewer has decided this record.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

/// A license record as stored on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// Ledger-assigned identifier.
    pub id: LicenseId,
    /// Registered company name.
    pub company_name: String,
    /// Registered company address.
    pub company_address: String,
    /// Content address of the supporting document.
    pub document: ContentAddress,
    /// Review status.
    pub status: LicenseStatus,
    /// Account that submitted the application.
    pub submitter: Address,
    /// Account that reviewed it; `None` while pending.
    pub reviewer: Option<Address>,
}

impl LicenseRecord {
    /// Build a record from the ledger's reviewer field, mapping the zero
    /// sentinel to `None`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_ledger(
        id: LicenseId,
        company_name: String,
        company_address: String,
        document: ContentAddress,
        status: LicenseStatus,
        submitter: Address,
        reviewer: Address,
    ) -> Self {
        Self {
            id,
            company_name,
            company_address,
            document,
            status,
            submitter,
            reviewer: (!reviewer.is_zero()).then_some(reviewer),
        }
    }

    /// Whether the record was submitted by `identity`.
    pub fn submitted_by(&self, identity: &Address) -> bool {
        self.submitter == *identity
    }

    /// Reviewer as the ledger encodes it (zero when unreviewed).
    pub fn reviewer_or_zero(&self) -> Address {
        self.reviewer.unwrap_or(Address::ZERO)
    }
}

/// The payload of a new submission after its document has been uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseApplication {
    /// Company name, trimmed.
    pub company_name: String,
    /// Company address, trimmed.
    pub company_address: String,
    /// Content address of the uploaded document.
    pub document: ContentAddress,
}

impl LicenseApplication {
    /// Validate and build an application.
    pub fn new(
        company_name: &str,
        company_address: &str,
        document: ContentAddress,
    ) -> Result<Self, ValidationError> {
        let company_name = company_name.trim();
        let company_address = company_address.trim();
        if company_name.is_empty() {
            return Err(ValidationError::EmptyCompanyName);
        }
        if company_address.is_empty() {
            return Err(ValidationError::EmptyCompanyAddress);
        }
        Ok(Self {
            company_name: company_name.to_string(),
            company_address: company_address.to_string(),
            document,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid() -> ContentAddress {
        ContentAddress::new("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG").unwrap()
    }

    #[test]
    fn status_codes_match_ledger_encoding() {
        for status in [
            LicenseStatus::Pending,
            LicenseStatus::Approved,
            LicenseStatus::Rejected,
        ] {
            assert_eq!(LicenseStatus::from_code(status.code()).unwrap(), status);
        }
        assert_eq!(
            LicenseStatus::from_code(3),
            Err(ValidationError::UnknownStatus(3))
        );
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!LicenseStatus::Pending.is_terminal());
        assert!(LicenseStatus::Approved.is_terminal());
        assert!(LicenseStatus::Rejected.is_terminal());
    }

    #[test]
    fn status_display() {
        assert_eq!(LicenseStatus::Pending.to_string(), "PENDING");
        assert_eq!(LicenseStatus::Approved.to_string(), "APPROVED");
        assert_eq!(LicenseStatus::Rejected.to_string(), "REJECTED");
    }

    #[test]
    fn zero_reviewer_maps_to_none() {
        let submitter = Address::from_bytes([1u8; 20]);
        let rec = LicenseRecord::from_ledger(
            LicenseId(1),
            "Acme".into(),
            "123 Main St".into(),
            cid(),
            LicenseStatus::Pending,
            submitter,
            Address::ZERO,
        );
        assert_eq!(rec.reviewer, None);
        assert!(rec.reviewer_or_zero().is_zero());
        assert!(rec.submitted_by(&submitter));
    }

    #[test]
    fn application_requires_both_text_fields() {
        assert_eq!(
            LicenseApplication::new("  ", "123 Main St", cid()),
            Err(ValidationError::EmptyCompanyName)
        );
        assert_eq!(
            LicenseApplication::new("Acme", "", cid()),
            Err(ValidationError::EmptyCompanyAddress)
        );
        let app = LicenseApplication::new(" Acme ", "123 Main St", cid()).unwrap();
        assert_eq!(app.company_name, "Acme");
    }

    #[test]
    fn record_serialization() {
        let rec = LicenseRecord::from_ledger(
            LicenseId(4),
            "Acme".into(),
            "123 Main St".into(),
            cid(),
            LicenseStatus::Approved,
            Address::from_bytes([1u8; 20]),
            Address::from_bytes([2u8; 20]),
        );
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["status"], "APPROVED");
        assert_eq!(json["id"], 4);
        let back: LicenseRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }
}
