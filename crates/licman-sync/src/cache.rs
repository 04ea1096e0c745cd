//! # License Record Cache
//!
//! An in-memory, versioned projection of the ledger's license records. The
//! ledger stays authoritative; the cache can be dropped and rebuilt at any
//! time and is never persisted.
//!
//! ## Versioning
//!
//! Every reconciliation pass and every upsert takes a fresh, strictly
//! increasing generation number before doing any I/O. Each entry remembers
//! the generation that last wrote it. A write from generation `g` is
//! accepted only if `g` is at least the entry's generation, so a pass that
//! started earlier can never overwrite an entry refreshed by a pass that
//! started later, whatever order their fetches complete in.
//!
//! Independently of generations, an incoming record must be a legal
//! successor of the held one (see [`licman_state::check_successor`]): a
//! reviewed record never reverts to pending and never changes its fields.
//!
//! ## Partial Failure
//!
//! A record whose fetch fails keeps its last-known data and is flagged
//! stale. The failure is reported per record in the [`CacheSnapshot`];
//! it never fails the whole pass.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use licman_client::Ledger;
use licman_core::{LicenseId, LicenseRecord};
use licman_state::{check_record, check_successor, LicenseError};
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{CacheError, FetchWarning, PartialFailure, ReconcileError};

/// A cached record with its version metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub record: LicenseRecord,
    /// Incremented on every accepted write.
    pub version: u64,
    /// Generation of the pass or upsert that last wrote this entry.
    pub generation: u64,
    /// The most recent fetch for this record failed.
    pub stale: bool,
    pub fetched_at: DateTime<Utc>,
}

/// Result of offering a record to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Stored; carries the entry's new version.
    Applied { version: u64 },
    /// A later generation already wrote this entry.
    Superseded,
    /// The record is not a legal successor of the held one.
    Rejected(LicenseError),
}

/// Cache contents after a reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct CacheSnapshot {
    /// Generation of the pass.
    pub generation: u64,
    /// Every cached record, ordered by identifier.
    pub records: Vec<LicenseRecord>,
    /// Records that could not be refreshed in this pass.
    pub warnings: Vec<FetchWarning>,
    /// Records whose fetched data was discarded because a later pass had
    /// already written them.
    pub superseded: Vec<LicenseId>,
}

impl CacheSnapshot {
    /// The non-fatal failure report for this pass, if any record failed.
    pub fn partial_failure(&self) -> Option<PartialFailure> {
        (!self.warnings.is_empty()).then(|| PartialFailure {
            failures: self.warnings.clone(),
        })
    }

    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: BTreeMap<LicenseId, CacheEntry>,
    generation: u64,
}

/// Shared, cloneable license cache.
///
/// The lock is `parking_lot` and is never held across `.await`; every
/// mutation is a short synchronous critical section.
#[derive(Debug, Clone, Default)]
pub struct LicenseCache {
    state: Arc<RwLock<CacheState>>,
}

impl LicenseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next generation number.
    pub fn begin_pass(&self) -> u64 {
        let mut state = self.state.write();
        state.generation += 1;
        state.generation
    }

    /// Offer a record fetched under generation `pass`.
    pub fn apply(&self, pass: u64, record: LicenseRecord) -> ApplyOutcome {
        let mut guard = self.state.write();
        let state = &mut *guard;
        match state.entries.get_mut(&record.id) {
            Some(entry) => {
                if pass < entry.generation {
                    return ApplyOutcome::Superseded;
                }
                if let Err(e) = check_successor(&entry.record, &record) {
                    return ApplyOutcome::Rejected(e);
                }
                entry.record = record;
                entry.version += 1;
                entry.generation = pass;
                entry.stale = false;
                entry.fetched_at = Utc::now();
                ApplyOutcome::Applied {
                    version: entry.version,
                }
            }
            None => {
                if let Err(e) = check_record(&record) {
                    return ApplyOutcome::Rejected(e);
                }
                state.entries.insert(
                    record.id,
                    CacheEntry {
                        record,
                        version: 1,
                        generation: pass,
                        stale: false,
                        fetched_at: Utc::now(),
                    },
                );
                ApplyOutcome::Applied { version: 1 }
            }
        }
    }

    /// Flag `id` stale after a failed fetch in generation `pass`. Entries
    /// already refreshed by a later generation are left alone.
    pub fn mark_stale(&self, pass: u64, id: LicenseId) {
        let mut state = self.state.write();
        if let Some(entry) = state.entries.get_mut(&id) {
            if pass >= entry.generation {
                entry.stale = true;
            }
        }
    }

    /// Store a record produced by a confirmed local write, without waiting
    /// for a reconciliation pass.
    pub fn upsert(&self, record: LicenseRecord) -> ApplyOutcome {
        let pass = self.begin_pass();
        let id = record.id;
        let outcome = self.apply(pass, record);
        match &outcome {
            ApplyOutcome::Applied { version } => {
                tracing::debug!(license = %id, version, "upserted license")
            }
            ApplyOutcome::Rejected(e) => tracing::warn!(license = %id, "upsert rejected: {e}"),
            ApplyOutcome::Superseded => {}
        }
        outcome
    }

    pub fn get(&self, id: LicenseId) -> Result<LicenseRecord, CacheError> {
        self.state
            .read()
            .entries
            .get(&id)
            .map(|e| e.record.clone())
            .ok_or(CacheError::NotFound(id))
    }

    pub fn entry(&self, id: LicenseId) -> Option<CacheEntry> {
        self.state.read().entries.get(&id).cloned()
    }

    /// All records, ordered by identifier.
    pub fn records(&self) -> Vec<LicenseRecord> {
        self.state
            .read()
            .entries
            .values()
            .map(|e| e.record.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Refresh the cache from the ledger.
    ///
    /// Lists identifiers, then fetches every record concurrently and applies
    /// each as it completes. Fails only if the identifier list itself is
    /// unavailable.
    pub async fn reconcile<L: Ledger + ?Sized>(
        &self,
        ledger: &L,
    ) -> Result<CacheSnapshot, ReconcileError> {
        let pass = self.begin_pass();
        let ids = ledger
            .license_ids()
            .await
            .map_err(ReconcileError::IdsUnavailable)?;

        let mut fetches: FuturesUnordered<_> = ids
            .iter()
            .map(|&id| async move { (id, ledger.license(id).await) })
            .collect();

        let mut warnings = Vec::new();
        let mut superseded = Vec::new();
        while let Some((id, result)) = fetches.next().await {
            match result {
                Ok(record) => match self.apply(pass, record) {
                    ApplyOutcome::Applied { .. } => {}
                    ApplyOutcome::Superseded => {
                        tracing::debug!(license = %id, pass, "discarded read from older pass");
                        superseded.push(id);
                    }
                    ApplyOutcome::Rejected(e) => {
                        tracing::warn!(license = %id, pass, "ledger read rejected: {e}");
                        self.mark_stale(pass, id);
                        warnings.push(FetchWarning {
                            id,
                            reason: e.to_string(),
                        });
                    }
                },
                Err(e) => {
                    tracing::warn!(license = %id, pass, "fetch failed, keeping last known record: {e}");
                    self.mark_stale(pass, id);
                    warnings.push(FetchWarning {
                        id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        warnings.sort_by_key(|w| w.id);
        superseded.sort();
        let records = self.records();
        tracing::info!(
            pass,
            listed = ids.len(),
            cached = records.len(),
            failed = warnings.len(),
            superseded = superseded.len(),
            "reconciliation finished"
        );
        Ok(CacheSnapshot {
            generation: pass,
            records,
            warnings,
            superseded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use licman_core::{Address, ContentAddress, LicenseStatus};

    const ADMIN: Address = Address::from_bytes([0xAD; 20]);

    fn record(id: u64, status: LicenseStatus) -> LicenseRecord {
        LicenseRecord {
            id: LicenseId(id),
            company_name: format!("Company {id}"),
            company_address: "1 Main St".to_string(),
            document: ContentAddress::new(format!("QmDoc{id}")).unwrap(),
            status,
            submitter: Address::from_bytes([0x01; 20]),
            reviewer: status.is_terminal().then_some(ADMIN),
        }
    }

    #[test]
    fn first_write_creates_version_one() {
        let cache = LicenseCache::new();
        let pass = cache.begin_pass();
        assert_eq!(
            cache.apply(pass, record(1, LicenseStatus::Pending)),
            ApplyOutcome::Applied { version: 1 }
        );
        assert_eq!(cache.entry(LicenseId(1)).unwrap().generation, pass);
    }

    #[test]
    fn every_accepted_write_bumps_version() {
        let cache = LicenseCache::new();
        cache.apply(cache.begin_pass(), record(1, LicenseStatus::Pending));
        cache.apply(cache.begin_pass(), record(1, LicenseStatus::Pending));
        let outcome = cache.apply(cache.begin_pass(), record(1, LicenseStatus::Approved));
        assert_eq!(outcome, ApplyOutcome::Applied { version: 3 });
    }

    #[test]
    fn older_pass_cannot_overwrite_newer() {
        let cache = LicenseCache::new();
        let early = cache.begin_pass();
        let late = cache.begin_pass();
        cache.apply(late, record(1, LicenseStatus::Approved));
        assert_eq!(
            cache.apply(early, record(1, LicenseStatus::Pending)),
            ApplyOutcome::Superseded
        );
        assert_eq!(cache.get(LicenseId(1)).unwrap().status, LicenseStatus::Approved);
    }

    #[test]
    fn regression_is_rejected_even_from_newer_pass() {
        let cache = LicenseCache::new();
        cache.apply(cache.begin_pass(), record(1, LicenseStatus::Rejected));
        let outcome = cache.apply(cache.begin_pass(), record(1, LicenseStatus::Pending));
        assert!(matches!(outcome, ApplyOutcome::Rejected(_)));
        assert_eq!(cache.get(LicenseId(1)).unwrap().status, LicenseStatus::Rejected);
    }

    #[test]
    fn inconsistent_new_record_is_rejected() {
        let cache = LicenseCache::new();
        let mut bad = record(1, LicenseStatus::Approved);
        bad.reviewer = None;
        assert!(matches!(
            cache.apply(cache.begin_pass(), bad),
            ApplyOutcome::Rejected(_)
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn stale_flag_respects_generation() {
        let cache = LicenseCache::new();
        let early = cache.begin_pass();
        let late = cache.begin_pass();
        cache.apply(late, record(1, LicenseStatus::Pending));
        cache.mark_stale(early, LicenseId(1));
        assert!(!cache.entry(LicenseId(1)).unwrap().stale);
        cache.mark_stale(cache.begin_pass(), LicenseId(1));
        assert!(cache.entry(LicenseId(1)).unwrap().stale);
    }

    #[test]
    fn upsert_outranks_pass_started_before_it() {
        let cache = LicenseCache::new();
        let in_flight = cache.begin_pass();
        cache.upsert(record(2, LicenseStatus::Approved));
        assert_eq!(
            cache.apply(in_flight, record(2, LicenseStatus::Pending)),
            ApplyOutcome::Superseded
        );
    }

    #[test]
    fn get_missing_is_not_found() {
        let cache = LicenseCache::new();
        assert_eq!(cache.get(LicenseId(5)), Err(CacheError::NotFound(LicenseId(5))));
    }

    #[test]
    fn records_are_ordered_by_id() {
        let cache = LicenseCache::new();
        for id in [3, 1, 2] {
            cache.upsert(record(id, LicenseStatus::Pending));
        }
        let ids: Vec<u64> = cache.records().iter().map(|r| r.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn clones_share_state() {
        let cache = LicenseCache::new();
        let other = cache.clone();
        other.upsert(record(1, LicenseStatus::Pending));
        assert_eq!(cache.len(), 1);
    }
}
