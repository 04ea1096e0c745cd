//! In-process ledger and content store.
//!
//! These implement [`Ledger`] and [`ContentStore`] without a node or an
//! IPFS daemon. The ledger enforces the same preconditions as the contract
//! (only the admin reviews, only pending records are reviewed) and both
//! doubles expose failure injection so the sync layer can be exercised
//! against partial outages, slow reads, and unconfirmed transactions.
//!
//! Locks are never held across an await point.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use licman_core::{Address, ContentAddress, LicenseApplication, LicenseId, LicenseRecord, LicenseStatus};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::content::{gateway_link, ContentStore, Document};
use crate::error::{ContentStoreError, LedgerError};
use crate::ledger::{Ledger, TxHash, TxReceipt};

/// JSON-RPC "internal error", which nodes use for reverted calls.
const REVERT_CODE: i64 = -32603;

#[derive(Debug, Clone)]
enum WriteOp {
    Submit {
        from: Address,
        application: LicenseApplication,
    },
    Review {
        from: Address,
        id: LicenseId,
        status: LicenseStatus,
    },
}

#[derive(Debug, Default)]
struct LedgerState {
    records: BTreeMap<LicenseId, LicenseRecord>,
    next_id: u64,
    tx_counter: u64,
    block: u64,
    receipts: HashMap<TxHash, TxReceipt>,
    pending: Vec<(TxHash, WriteOp)>,
    read_delays: HashMap<LicenseId, Duration>,
    failing_reads: HashSet<LicenseId>,
    fail_ids: bool,
    fail_writes: Option<String>,
    withhold_receipts: bool,
    revert_on_mine: bool,
    writes: usize,
}

impl LedgerState {
    /// Contract `require` checks. `Err` carries the revert reason.
    fn check(&self, admin: Address, op: &WriteOp) -> Result<(), String> {
        match op {
            WriteOp::Submit { .. } => Ok(()),
            WriteOp::Review { from, id, status } => {
                if *from != admin {
                    return Err("only admin can review".to_string());
                }
                let record = self
                    .records
                    .get(id)
                    .ok_or_else(|| "license does not exist".to_string())?;
                if record.status != LicenseStatus::Pending {
                    return Err("license already reviewed".to_string());
                }
                if *status == LicenseStatus::Pending {
                    return Err("invalid status".to_string());
                }
                Ok(())
            }
        }
    }

    fn mine(&mut self, admin: Address, hash: TxHash, op: WriteOp) {
        self.block += 1;
        let succeeded = !self.revert_on_mine && self.check(admin, &op).is_ok();
        if succeeded {
            match op {
                WriteOp::Submit { from, application } => {
                    self.next_id += 1;
                    let id = LicenseId(self.next_id);
                    self.records.insert(
                        id,
                        LicenseRecord {
                            id,
                            company_name: application.company_name,
                            company_address: application.company_address,
                            document: application.document,
                            status: LicenseStatus::Pending,
                            submitter: from,
                            reviewer: None,
                        },
                    );
                }
                WriteOp::Review { from, id, status } => {
                    if let Some(record) = self.records.get_mut(&id) {
                        record.status = status;
                        record.reviewer = Some(from);
                    }
                }
            }
        }
        self.receipts.insert(
            hash.clone(),
            TxReceipt {
                tx_hash: hash,
                block_number: self.block,
                succeeded,
                contract_address: None,
            },
        );
    }
}

/// In-memory license contract.
#[derive(Debug)]
pub struct InMemoryLedger {
    admin: Address,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    /// A fresh contract administered by `admin`. Identifiers start at 1.
    pub fn new(admin: Address) -> Self {
        Self {
            admin,
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Delay reads of `id`. The record is captured before the delay, so a
    /// delayed read can return state that is stale by the time it lands.
    pub fn set_read_delay(&self, id: LicenseId, delay: Duration) {
        self.state.lock().read_delays.insert(id, delay);
    }

    pub fn clear_read_delay(&self, id: LicenseId) {
        self.state.lock().read_delays.remove(&id);
    }

    /// Make reads of `id` fail until healed.
    pub fn fail_reads(&self, id: LicenseId) {
        self.state.lock().failing_reads.insert(id);
    }

    pub fn heal_reads(&self, id: LicenseId) {
        self.state.lock().failing_reads.remove(&id);
    }

    /// Make the identifier list query fail.
    pub fn fail_id_listing(&self, fail: bool) {
        self.state.lock().fail_ids = fail;
    }

    /// Reject every transaction at send time with `reason`.
    pub fn fail_writes(&self, reason: Option<&str>) {
        self.state.lock().fail_writes = reason.map(str::to_string);
    }

    /// Accept transactions but leave them unmined until
    /// [`mine_pending`](Self::mine_pending).
    pub fn withhold_receipts(&self, withhold: bool) {
        self.state.lock().withhold_receipts = withhold;
    }

    /// Mine transactions sent while receipts were withheld.
    pub fn mine_pending(&self) {
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);
        for (hash, op) in pending {
            state.mine(self.admin, hash, op);
        }
    }

    /// Mine subsequent transactions with failure status.
    pub fn revert_on_mine(&self, revert: bool) {
        self.state.lock().revert_on_mine = revert;
    }

    /// Transactions accepted so far.
    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }

    fn send(&self, op: WriteOp) -> Result<TxHash, LedgerError> {
        let mut state = self.state.lock();
        if let Some(reason) = state.fail_writes.clone() {
            return Err(LedgerError::Rpc {
                method: "eth_sendTransaction".to_string(),
                code: REVERT_CODE,
                message: reason,
            });
        }
        state.check(self.admin, &op).map_err(|reason| LedgerError::Rpc {
            method: "eth_sendTransaction".to_string(),
            code: REVERT_CODE,
            message: format!("execution reverted: {reason}"),
        })?;
        state.tx_counter += 1;
        state.writes += 1;
        let hash = TxHash::parse(&format!("0x{:064x}", state.tx_counter))?;
        if state.withhold_receipts {
            state.pending.push((hash.clone(), op));
        } else {
            state.mine(self.admin, hash.clone(), op);
        }
        Ok(hash)
    }
}

impl Ledger for InMemoryLedger {
    async fn license_ids(&self) -> Result<Vec<LicenseId>, LedgerError> {
        let state = self.state.lock();
        if state.fail_ids {
            return Err(LedgerError::Status {
                method: "eth_call".to_string(),
                status: 503,
            });
        }
        Ok(state.records.keys().copied().collect())
    }

    async fn license(&self, id: LicenseId) -> Result<LicenseRecord, LedgerError> {
        let (record, delay) = {
            let state = self.state.lock();
            if state.failing_reads.contains(&id) {
                return Err(LedgerError::Status {
                    method: "eth_call".to_string(),
                    status: 503,
                });
            }
            (state.records.get(&id).cloned(), state.read_delays.get(&id).copied())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        record.ok_or(LedgerError::NotFound(id))
    }

    async fn admin_address(&self) -> Result<Address, LedgerError> {
        Ok(self.admin)
    }

    async fn submit_license(
        &self,
        from: Address,
        application: &LicenseApplication,
    ) -> Result<TxHash, LedgerError> {
        self.send(WriteOp::Submit {
            from,
            application: application.clone(),
        })
    }

    async fn review_license(
        &self,
        from: Address,
        id: LicenseId,
        status: LicenseStatus,
    ) -> Result<TxHash, LedgerError> {
        self.send(WriteOp::Review { from, id, status })
    }

    async fn receipt(&self, tx: &TxHash) -> Result<Option<TxReceipt>, LedgerError> {
        Ok(self.state.lock().receipts.get(tx).cloned())
    }
}

/// In-memory content store.
///
/// Addresses are derived from the bytes alone. Uploads can be paused to
/// hold a submission in its upload phase.
#[derive(Debug)]
pub struct InMemoryContentStore {
    gateway: String,
    documents: Mutex<HashMap<ContentAddress, Vec<u8>>>,
    failure: Mutex<Option<String>>,
    gate: watch::Sender<bool>,
    attempts: AtomicUsize,
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8081")
    }
}

impl InMemoryContentStore {
    pub fn new(gateway: &str) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            gateway: gateway.trim_end_matches('/').to_string(),
            documents: Mutex::new(HashMap::new()),
            failure: Mutex::new(None),
            gate,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Hold uploads until [`resume_uploads`](Self::resume_uploads).
    pub fn pause_uploads(&self) {
        self.gate.send_replace(false);
    }

    pub fn resume_uploads(&self) {
        self.gate.send_replace(true);
    }

    /// Fail subsequent uploads with `reason`.
    pub fn fail_uploads(&self, reason: Option<&str>) {
        *self.failure.lock() = reason.map(str::to_string);
    }

    /// Uploads started so far, including failed and paused ones.
    pub fn upload_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Number of distinct documents stored.
    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }

    fn address_of(bytes: &[u8]) -> Result<ContentAddress, ContentStoreError> {
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        let encoded = format!("Qm{:016x}{:016x}", hasher.finish(), bytes.len());
        ContentAddress::new(encoded).map_err(|e| ContentStoreError::MalformedResponse {
            endpoint: "memory".to_string(),
            reason: e.to_string(),
        })
    }
}

impl ContentStore for InMemoryContentStore {
    async fn put(&self, document: &Document) -> Result<ContentAddress, ContentStoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let mut gate = self.gate.subscribe();
        loop {
            let open = *gate.borrow_and_update();
            if open || gate.changed().await.is_err() {
                break;
            }
        }
        if let Some(reason) = self.failure.lock().clone() {
            return Err(ContentStoreError::Api {
                endpoint: "memory".to_string(),
                status: 500,
                body: reason,
            });
        }
        let address = Self::address_of(&document.bytes)?;
        self.documents
            .lock()
            .insert(address.clone(), document.bytes.clone());
        Ok(address)
    }

    async fn get(&self, address: &ContentAddress) -> Result<Vec<u8>, ContentStoreError> {
        self.documents
            .lock()
            .get(address)
            .cloned()
            .ok_or_else(|| ContentStoreError::NotFound(address.to_string()))
    }

    fn link(&self, address: &ContentAddress) -> Option<String> {
        gateway_link(&self.gateway, address)
    }
}
