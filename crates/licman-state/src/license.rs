//! # License Review State Machine
//!
//! ## States
//!
//! ```text
//! Pending ──▶ Approved (terminal)
//!    │
//!    └─────▶ Rejected (terminal)
//! ```
//!
//! A record is created `Pending` with no reviewer. A single review moves it
//! to a terminal state and records the reviewer. After that the record is
//! immutable: every field, including the reviewer, is frozen.
//!
//! ## Successor Checks
//!
//! Reads from the ledger can arrive out of order. [`check_successor`]
//! decides whether an incoming copy of a record may replace the one held
//! locally. Anything that would move a terminal record back to `Pending`,
//! or alter a field that the ledger never rewrites, is rejected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use licman_core::{Address, LicenseId, LicenseRecord, LicenseStatus};

// ─── Review Decision ─────────────────────────────────────────────────

/// The administrator's decision on a pending record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewDecision {
    /// Approve the application.
    Approve,
    /// Reject the application.
    Reject,
}

impl ReviewDecision {
    /// Map the boolean form used by review actions.
    pub fn from_approval(approve: bool) -> Self {
        if approve {
            Self::Approve
        } else {
            Self::Reject
        }
    }

    /// Status the record ends in after this decision.
    pub fn target(&self) -> LicenseStatus {
        match self {
            Self::Approve => LicenseStatus::Approved,
            Self::Reject => LicenseStatus::Rejected,
        }
    }
}

impl std::fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approve => f.write_str("APPROVE"),
            Self::Reject => f.write_str("REJECT"),
        }
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by license transitions and record checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LicenseError {
    /// Attempted transition is not valid from the current state.
    #[error("license {id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        /// Record identifier.
        id: LicenseId,
        /// Current state.
        from: LicenseStatus,
        /// Attempted target state.
        to: LicenseStatus,
    },

    /// License is in a terminal state and cannot change.
    #[error("license {id} is in terminal state {state}")]
    TerminalState {
        /// Record identifier.
        id: LicenseId,
        /// The terminal state.
        state: LicenseStatus,
    },

    /// A field the ledger never rewrites differs between two reads.
    #[error("license {id}: immutable field `{field}` changed")]
    ImmutableFieldChanged {
        /// Record identifier.
        id: LicenseId,
        /// Name of the field.
        field: &'static str,
    },

    /// Reviewer presence does not match the status.
    #[error("license {id}: status {status} inconsistent with reviewer field")]
    InconsistentReviewer {
        /// Record identifier.
        id: LicenseId,
        /// Status that was reported.
        status: LicenseStatus,
    },

    /// Two records with different identifiers were compared.
    #[error("license id mismatch: held {held}, incoming {incoming}")]
    IdMismatch {
        /// Identifier of the held record.
        held: LicenseId,
        /// Identifier of the incoming record.
        incoming: LicenseId,
    },
}

// ─── Transition Record ───────────────────────────────────────────────

/// A review transition, either applied locally or observed on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewTransition {
    /// Record identifier.
    pub id: LicenseId,
    /// State before the review.
    pub from: LicenseStatus,
    /// State after the review.
    pub to: LicenseStatus,
    /// Account that reviewed.
    pub reviewer: Address,
}

// ─── Operations ──────────────────────────────────────────────────────

/// Apply a review to a pending record (PENDING → APPROVED | REJECTED).
///
/// Returns the reviewed record and the transition. The input is not
/// modified, so callers can compute the expected outcome before the
/// ledger confirms it.
pub fn review(
    record: &LicenseRecord,
    decision: ReviewDecision,
    reviewer: Address,
) -> Result<(LicenseRecord, ReviewTransition), LicenseError> {
    let to = decision.target();
    if record.status.is_terminal() {
        return Err(LicenseError::TerminalState {
            id: record.id,
            state: record.status,
        });
    }
    let mut next = record.clone();
    next.status = to;
    next.reviewer = Some(reviewer);
    let transition = ReviewTransition {
        id: record.id,
        from: record.status,
        to,
        reviewer,
    };
    Ok((next, transition))
}

/// Check the reviewer/status invariant of a single record.
///
/// `Pending` records have no reviewer; terminal records have one.
pub fn check_record(record: &LicenseRecord) -> Result<(), LicenseError> {
    let consistent = match record.status {
        LicenseStatus::Pending => record.reviewer.is_none(),
        LicenseStatus::Approved | LicenseStatus::Rejected => record.reviewer.is_some(),
    };
    if consistent {
        Ok(())
    } else {
        Err(LicenseError::InconsistentReviewer {
            id: record.id,
            status: record.status,
        })
    }
}

/// Decide whether `incoming` may replace `held`.
///
/// Returns `Ok(Some(transition))` when the incoming copy shows a review
/// that the held copy has not seen yet, `Ok(None)` when nothing about the
/// review state changed, and an error when the incoming copy is not a
/// legal successor.
pub fn check_successor(
    held: &LicenseRecord,
    incoming: &LicenseRecord,
) -> Result<Option<ReviewTransition>, LicenseError> {
    if held.id != incoming.id {
        return Err(LicenseError::IdMismatch {
            held: held.id,
            incoming: incoming.id,
        });
    }
    check_record(incoming)?;
    require_unchanged(held, incoming)?;

    match (held.status, incoming.status) {
        (LicenseStatus::Pending, LicenseStatus::Pending) => Ok(None),
        (LicenseStatus::Pending, to) => {
            let reviewer = incoming
                .reviewer
                .ok_or(LicenseError::InconsistentReviewer { id: incoming.id, status: to })?;
            Ok(Some(ReviewTransition {
                id: held.id,
                from: LicenseStatus::Pending,
                to,
                reviewer,
            }))
        }
        (from, to) if from == to => {
            if held.reviewer != incoming.reviewer {
                return Err(LicenseError::ImmutableFieldChanged {
                    id: held.id,
                    field: "reviewer",
                });
            }
            Ok(None)
        }
        (LicenseStatus::Approved | LicenseStatus::Rejected, LicenseStatus::Pending) => {
            Err(LicenseError::TerminalState {
                id: held.id,
                state: held.status,
            })
        }
        (from, to) => Err(LicenseError::InvalidTransition { id: held.id, from, to }),
    }
}

fn require_unchanged(held: &LicenseRecord, incoming: &LicenseRecord) -> Result<(), LicenseError> {
    let field = if held.company_name != incoming.company_name {
        Some("company_name")
    } else if held.company_address != incoming.company_address {
        Some("company_address")
    } else if held.document != incoming.document {
        Some("document")
    } else if held.submitter != incoming.submitter {
        Some("submitter")
    } else {
        None
    };
    match field {
        Some(field) => Err(LicenseError::ImmutableFieldChanged { id: held.id, field }),
        None => Ok(()),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use licman_core::ContentAddress;

    fn submitter() -> Address {
        Address::from_bytes([0x11; 20])
    }

    fn admin() -> Address {
        Address::from_bytes([0xAA; 20])
    }

    fn make_pending(id: u64) -> LicenseRecord {
        LicenseRecord {
            id: LicenseId(id),
            company_name: "Acme".into(),
            company_address: "123 Main St".into(),
            document: ContentAddress::new("QmDoc").unwrap(),
            status: LicenseStatus::Pending,
            submitter: submitter(),
            reviewer: None,
        }
    }

    fn make_approved(id: u64) -> LicenseRecord {
        review(&make_pending(id), ReviewDecision::Approve, admin()).unwrap().0
    }

    // ── Review transitions ───────────────────────────────────────────

    #[test]
    fn test_pending_to_approved() {
        let (next, transition) = review(&make_pending(1), ReviewDecision::Approve, admin()).unwrap();
        assert_eq!(next.status, LicenseStatus::Approved);
        assert_eq!(next.reviewer, Some(admin()));
        assert_eq!(transition.from, LicenseStatus::Pending);
        assert_eq!(transition.to, LicenseStatus::Approved);
    }

    #[test]
    fn test_pending_to_rejected() {
        let (next, _) = review(&make_pending(1), ReviewDecision::Reject, admin()).unwrap();
        assert_eq!(next.status, LicenseStatus::Rejected);
        assert!(check_record(&next).is_ok());
    }

    #[test]
    fn test_cannot_review_terminal_record() {
        let approved = make_approved(2);
        let err = review(&approved, ReviewDecision::Reject, admin()).unwrap_err();
        assert_eq!(
            err,
            LicenseError::TerminalState {
                id: LicenseId(2),
                state: LicenseStatus::Approved
            }
        );
    }

    #[test]
    fn test_review_leaves_input_untouched() {
        let pending = make_pending(3);
        let _ = review(&pending, ReviewDecision::Approve, admin()).unwrap();
        assert_eq!(pending.status, LicenseStatus::Pending);
    }

    #[test]
    fn test_decision_from_approval() {
        assert_eq!(ReviewDecision::from_approval(true).target(), LicenseStatus::Approved);
        assert_eq!(ReviewDecision::from_approval(false).target(), LicenseStatus::Rejected);
    }

    // ── Record invariant ─────────────────────────────────────────────

    #[test]
    fn test_pending_with_reviewer_is_inconsistent() {
        let mut rec = make_pending(4);
        rec.reviewer = Some(admin());
        assert!(matches!(
            check_record(&rec),
            Err(LicenseError::InconsistentReviewer { .. })
        ));
    }

    #[test]
    fn test_terminal_without_reviewer_is_inconsistent() {
        let mut rec = make_pending(4);
        rec.status = LicenseStatus::Rejected;
        assert!(check_record(&rec).is_err());
    }

    // ── Successor checks ─────────────────────────────────────────────

    #[test]
    fn test_successor_observes_review() {
        let transition = check_successor(&make_pending(5), &make_approved(5)).unwrap();
        assert_eq!(transition.map(|t| t.to), Some(LicenseStatus::Approved));
    }

    #[test]
    fn test_successor_unchanged_pending() {
        assert_eq!(check_successor(&make_pending(5), &make_pending(5)).unwrap(), None);
    }

    #[test]
    fn test_successor_rejects_regression_to_pending() {
        let err = check_successor(&make_approved(6), &make_pending(6)).unwrap_err();
        assert!(matches!(err, LicenseError::TerminalState { .. }));
    }

    #[test]
    fn test_successor_rejects_flip_between_terminal_states() {
        let approved = make_approved(7);
        let rejected = review(&make_pending(7), ReviewDecision::Reject, admin()).unwrap().0;
        let err = check_successor(&approved, &rejected).unwrap_err();
        assert!(matches!(err, LicenseError::InvalidTransition { .. }));
    }

    #[test]
    fn test_successor_rejects_reviewer_change() {
        let approved = make_approved(8);
        let mut other = approved.clone();
        other.reviewer = Some(submitter());
        let err = check_successor(&approved, &other).unwrap_err();
        assert_eq!(
            err,
            LicenseError::ImmutableFieldChanged {
                id: LicenseId(8),
                field: "reviewer"
            }
        );
    }

    #[test]
    fn test_successor_rejects_changed_document() {
        let held = make_pending(9);
        let mut incoming = held.clone();
        incoming.document = ContentAddress::new("QmOther").unwrap();
        assert!(matches!(
            check_successor(&held, &incoming),
            Err(LicenseError::ImmutableFieldChanged { field: "document", .. })
        ));
    }

    #[test]
    fn test_successor_rejects_other_id() {
        assert!(matches!(
            check_successor(&make_pending(1), &make_pending(2)),
            Err(LicenseError::IdMismatch { .. })
        ));
    }

    // ── Serialization ────────────────────────────────────────────────

    #[test]
    fn test_transition_serialization() {
        let (_, transition) = review(&make_pending(1), ReviewDecision::Reject, admin()).unwrap();
        let json = serde_json::to_string(&transition).unwrap();
        let parsed: ReviewTransition = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, transition);
    }
}
