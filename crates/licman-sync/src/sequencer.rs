//! # Submission Sequencer
//!
//! Runs the two-phase submission: upload the document, then register it on
//! the ledger and wait for confirmation.
//!
//! ```text
//! Idle ──▶ Uploading ──▶ Registering ──▶ Confirmed
//!              │              │
//!              ▼              ▼
//!        UploadFailed   RegistrationFailed
//! ```
//!
//! A registration failure leaves the uploaded document orphaned in the
//! content store. The error carries its content address; nothing is
//! retried automatically, since resending a registration could create a
//! second record.
//!
//! Each identity may have one submission in flight. The slot is claimed
//! before the first suspension point, so a concurrent second call fails
//! with `AlreadyInProgress` without any I/O.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use licman_client::{
    wait_for_confirmation, ConfirmationPolicy, ContentStore, Document, Ledger, LedgerError,
};
use licman_core::{Address, ContentAddress, LicenseApplication, LicenseRecord, ValidationError};
use parking_lot::Mutex;
use serde::Serialize;

use crate::cache::LicenseCache;
use crate::error::SubmissionError;
use crate::session::Session;

/// Phase of an identity's most recent submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPhase {
    Idle,
    Uploading,
    Registering,
    Confirmed,
    UploadFailed,
    RegistrationFailed,
}

impl SubmissionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::UploadFailed | Self::RegistrationFailed
        )
    }
}

impl fmt::Display for SubmissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Registering => "registering",
            Self::Confirmed => "confirmed",
            Self::UploadFailed => "upload failed",
            Self::RegistrationFailed => "registration failed",
        };
        f.write_str(s)
    }
}

/// The form a submitter fills in.
#[derive(Debug, Clone, Default)]
pub struct SubmissionDraft {
    pub company_name: String,
    pub company_address: String,
    pub document: Option<Document>,
}

impl SubmissionDraft {
    pub fn new(
        company_name: impl Into<String>,
        company_address: impl Into<String>,
        document: Option<Document>,
    ) -> Self {
        Self {
            company_name: company_name.into(),
            company_address: company_address.into(),
            document,
        }
    }

    /// Check every precondition that needs no I/O.
    fn validate(self) -> Result<(String, String, Document), ValidationError> {
        let name = self.company_name.trim();
        let address = self.company_address.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyCompanyName);
        }
        if address.is_empty() {
            return Err(ValidationError::EmptyCompanyAddress);
        }
        let document = self.document.ok_or(ValidationError::MissingDocument)?;
        Ok((name.to_string(), address.to_string(), document))
    }
}

/// Claims an identity's in-flight slot; releases it on drop.
struct InFlight {
    slots: Arc<Mutex<HashSet<Address>>>,
    identity: Address,
}

impl InFlight {
    fn claim(slots: &Arc<Mutex<HashSet<Address>>>, identity: Address) -> Option<Self> {
        slots.lock().insert(identity).then(|| Self {
            slots: Arc::clone(slots),
            identity,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.slots.lock().remove(&self.identity);
    }
}

/// Runs submissions against a content store and the session's ledger.
#[derive(Debug)]
pub struct SubmissionSequencer<S> {
    store: Arc<S>,
    cache: LicenseCache,
    policy: ConfirmationPolicy,
    in_flight: Arc<Mutex<HashSet<Address>>>,
    phases: Mutex<HashMap<Address, SubmissionPhase>>,
}

impl<S: ContentStore> SubmissionSequencer<S> {
    pub fn new(store: Arc<S>, cache: LicenseCache, policy: ConfirmationPolicy) -> Self {
        Self {
            store,
            cache,
            policy,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            phases: Mutex::new(HashMap::new()),
        }
    }

    /// Phase of `identity`'s most recent submission.
    pub fn phase(&self, identity: &Address) -> SubmissionPhase {
        self.phases
            .lock()
            .get(identity)
            .copied()
            .unwrap_or(SubmissionPhase::Idle)
    }

    fn set_phase(&self, identity: Address, phase: SubmissionPhase) {
        self.phases.lock().insert(identity, phase);
        tracing::info!(identity = %identity, %phase, "submission phase");
    }

    /// Upload the document, register it, and wait for confirmation.
    ///
    /// On success the new record, at `PENDING`, is upserted into the cache
    /// and returned. Callers should follow with a reconciliation to pick up
    /// the canonical ledger fields.
    ///
    /// [`SubmissionError::Unresolved`] is the one error that leaves the phase
    /// at `Confirmed`: the registration is on the ledger, but its record
    /// could not be located, so nothing is cached. A reconciliation will
    /// find it.
    pub async fn submit<L: Ledger>(
        &self,
        session: &Session<L>,
        draft: SubmissionDraft,
    ) -> Result<LicenseRecord, SubmissionError> {
        let (company_name, company_address, document) = draft.validate()?;
        let identity = session.identity().ok_or(ValidationError::NotConnected)?;
        let _slot = InFlight::claim(&self.in_flight, identity)
            .ok_or(SubmissionError::AlreadyInProgress(identity))?;

        self.set_phase(identity, SubmissionPhase::Uploading);
        let content_address = match self.store.put(&document).await {
            Ok(address) => address,
            Err(e) => {
                self.set_phase(identity, SubmissionPhase::UploadFailed);
                return Err(SubmissionError::Upload(e));
            }
        };

        self.set_phase(identity, SubmissionPhase::Registering);
        let result = self
            .register(
                session.ledger(),
                identity,
                &company_name,
                &company_address,
                &content_address,
            )
            .await;
        match result {
            Ok(record) => {
                self.cache.upsert(record.clone());
                self.set_phase(identity, SubmissionPhase::Confirmed);
                tracing::info!(license = %record.id, cid = %content_address, "submission confirmed");
                Ok(record)
            }
            // The registration itself confirmed; only locating it failed.
            Err(e @ SubmissionError::Unresolved { .. }) => {
                self.set_phase(identity, SubmissionPhase::Confirmed);
                Err(e)
            }
            Err(e) => {
                self.set_phase(identity, SubmissionPhase::RegistrationFailed);
                tracing::warn!(cid = %content_address, "document orphaned: {e}");
                Err(e)
            }
        }
    }

    async fn register<L: Ledger>(
        &self,
        ledger: &Arc<L>,
        identity: Address,
        company_name: &str,
        company_address: &str,
        content_address: &ContentAddress,
    ) -> Result<LicenseRecord, SubmissionError> {
        let application =
            LicenseApplication::new(company_name, company_address, content_address.clone())?;
        let tx = ledger
            .submit_license(identity, &application)
            .await
            .map_err(|source| SubmissionError::Registration {
                content_address: content_address.clone(),
                source,
            })?;

        match tokio::time::timeout(
            self.policy.timeout,
            wait_for_confirmation(ledger.as_ref(), &tx, self.policy.poll_interval),
        )
        .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(source)) => {
                return Err(SubmissionError::Registration {
                    content_address: content_address.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(SubmissionError::ConfirmationTimeout {
                    content_address: content_address.clone(),
                    tx_hash: tx,
                    waited: self.policy.timeout,
                })
            }
        }

        resolve_registered(ledger.as_ref(), identity, content_address)
            .await
            .map_err(|source| SubmissionError::Unresolved {
                content_address: content_address.clone(),
                tx_hash: tx.clone(),
                source,
            })
    }
}

/// Find the record a confirmed registration created: the newest one
/// submitted by `identity` for `document`.
async fn resolve_registered<L: Ledger>(
    ledger: &L,
    identity: Address,
    document: &ContentAddress,
) -> Result<LicenseRecord, Option<LedgerError>> {
    let ids = ledger.license_ids().await.map_err(Some)?;
    for id in ids.into_iter().rev() {
        let record = ledger.license(id).await.map_err(Some)?;
        if record.submitted_by(&identity) && record.document == *document {
            return Ok(record);
        }
    }
    Err(None)
}
