//! # Role-Gated Views and Review
//!
//! Projections of the cache for the two roles, the review authorization
//! predicate, and the review action itself.

use std::sync::Arc;

use licman_client::{wait_for_confirmation, ConfirmationPolicy, Ledger, LedgerError};
use licman_core::{Address, LicenseId, LicenseRecord};
use licman_state::ReviewDecision;

use crate::cache::LicenseCache;
use crate::error::ReviewError;
use crate::session::Session;

/// Every record, ordered by identifier.
pub fn project_admin_view(cache: &LicenseCache) -> Vec<LicenseRecord> {
    cache.records()
}

/// Records submitted by `identity`, ordered by identifier.
pub fn project_submitter_view(cache: &LicenseCache, identity: &Address) -> Vec<LicenseRecord> {
    cache
        .records()
        .into_iter()
        .filter(|r| r.submitted_by(identity))
        .collect()
}

/// Whether `identity` may review. Addresses compare by bytes, so hex case
/// never matters.
pub fn authorize_review(identity: &Address, admin: &Address) -> bool {
    identity == admin
}

/// Performs review decisions on behalf of the connected administrator.
#[derive(Debug, Clone)]
pub struct Reviewer {
    cache: LicenseCache,
    policy: ConfirmationPolicy,
}

impl Reviewer {
    pub fn new(cache: LicenseCache, policy: ConfirmationPolicy) -> Self {
        Self { cache, policy }
    }

    /// Approve or reject a pending license.
    ///
    /// Authorization and state are checked against the session and cache
    /// before anything is sent. On success the confirmed record is upserted
    /// into the cache and returned.
    pub async fn review<L: Ledger>(
        &self,
        session: &Session<L>,
        id: LicenseId,
        approve: bool,
    ) -> Result<LicenseRecord, ReviewError> {
        let identity = session.identity().ok_or(ReviewError::NotConnected)?;
        let admin = session.admin().ok_or(ReviewError::NotConnected)?;
        if !authorize_review(&identity, &admin) {
            return Err(ReviewError::Unauthorized { identity });
        }

        let current = self.cache.get(id).map_err(|_| ReviewError::NotFound(id))?;
        let decision = ReviewDecision::from_approval(approve);
        let (expected, transition) = licman_state::review(&current, decision, identity)
            .map_err(|_| ReviewError::InvalidState {
                id,
                status: current.status,
            })?;

        let ledger: &Arc<L> = session.ledger();
        let tx = ledger
            .review_license(identity, id, decision.target())
            .await?;

        match tokio::time::timeout(
            self.policy.timeout,
            wait_for_confirmation(ledger.as_ref(), &tx, self.policy.poll_interval),
        )
        .await
        {
            Ok(receipt) => {
                receipt?;
            }
            Err(_) => {
                return Err(ReviewError::ConfirmationTimeout {
                    id,
                    tx_hash: tx,
                    waited: self.policy.timeout,
                })
            }
        }

        let record = settle(ledger.license(id).await, expected);
        self.cache.upsert(record.clone());
        tracing::info!(
            license = %id,
            from = %transition.from,
            to = %transition.to,
            reviewer = %transition.reviewer,
            tx = %tx,
            "review confirmed"
        );
        Ok(record)
    }
}

/// The record to cache after a confirmed review: the re-read copy if it
/// already shows the decision, else the locally computed transition.
fn settle(reread: Result<LicenseRecord, LedgerError>, expected: LicenseRecord) -> LicenseRecord {
    match reread {
        Ok(record) if record.status == expected.status => record,
        Ok(record) => {
            tracing::warn!(
                license = %expected.id,
                read = %record.status,
                confirmed = %expected.status,
                "re-read after review lags the receipt, using local transition"
            );
            expected
        }
        Err(e) => {
            tracing::warn!(license = %expected.id, "re-read after review failed, using local transition: {e}");
            expected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use licman_core::{ContentAddress, LicenseStatus};

    fn record(id: u64, submitter: Address) -> LicenseRecord {
        LicenseRecord {
            id: LicenseId(id),
            company_name: format!("Company {id}"),
            company_address: "1 Main St".to_string(),
            document: ContentAddress::new(format!("QmDoc{id}")).unwrap(),
            status: LicenseStatus::Pending,
            submitter,
            reviewer: None,
        }
    }

    #[test]
    fn submitter_view_filters_by_identity() {
        let x = Address::from_bytes([0x0A; 20]);
        let y = Address::from_bytes([0x0F; 20]);
        let cache = LicenseCache::new();
        cache.upsert(record(1, y));
        cache.upsert(record(2, x));
        cache.upsert(record(3, y));

        let view = project_submitter_view(&cache, &x);
        assert_eq!(view, vec![record(2, x)]);
        assert_eq!(project_admin_view(&cache).len(), 3);
    }

    fn reviewed(id: u64, submitter: Address, status: LicenseStatus) -> LicenseRecord {
        LicenseRecord {
            status,
            reviewer: Some(Address::from_bytes([0xAD; 20])),
            ..record(id, submitter)
        }
    }

    #[test]
    fn settle_prefers_a_reread_showing_the_decision() {
        let x = Address::from_bytes([0x0A; 20]);
        let mut canonical = reviewed(4, x, LicenseStatus::Approved);
        canonical.company_name = "Company 4 Ltd".to_string();
        let expected = reviewed(4, x, LicenseStatus::Approved);
        assert_eq!(settle(Ok(canonical.clone()), expected), canonical);
    }

    #[test]
    fn settle_ignores_a_lagging_reread() {
        let x = Address::from_bytes([0x0A; 20]);
        let expected = reviewed(5, x, LicenseStatus::Rejected);
        assert_eq!(settle(Ok(record(5, x)), expected.clone()), expected);
    }

    #[test]
    fn settle_falls_back_when_reread_fails() {
        let x = Address::from_bytes([0x0A; 20]);
        let expected = reviewed(6, x, LicenseStatus::Approved);
        let failed = Err(LedgerError::NotFound(LicenseId(6)));
        assert_eq!(settle(failed, expected.clone()), expected);
    }

    #[test]
    fn authorization_ignores_hex_case() {
        let upper = Address::parse("0xABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
        let lower = Address::parse("0xabcdef0123456789abcdef0123456789abcdef01").unwrap();
        assert!(authorize_review(&upper, &lower));
        assert!(authorize_review(&lower, &upper));
        assert!(!authorize_review(&lower, &Address::ZERO));
    }
}
