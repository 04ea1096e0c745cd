//! # Session Context
//!
//! The connected account and the administrator identity, held explicitly
//! and passed to every action that needs them.
//!
//! The role is derived on demand from the two identities, never stored.
//! Actions read the identity at the moment they run, so an account switch
//! via [`Session::reconnect`] takes effect for the next action.

use std::fmt;
use std::sync::Arc;

use licman_client::{Ledger, LedgerError};
use licman_core::Address;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::projector::authorize_review;

/// Role of the connected account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The contract's administrator. Reviews submissions.
    Admin,
    /// Any other account. Submits and tracks its own licenses.
    Submitter,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => f.write_str("admin"),
            Self::Submitter => f.write_str("submitter"),
        }
    }
}

#[derive(Debug, Default)]
struct Identities {
    account: Option<Address>,
    admin: Option<Address>,
}

/// A connection to the license contract on behalf of one account.
#[derive(Debug)]
pub struct Session<L> {
    ledger: Arc<L>,
    identities: RwLock<Identities>,
}

impl<L: Ledger> Session<L> {
    /// A disconnected session.
    pub fn new(ledger: Arc<L>) -> Self {
        Self {
            ledger,
            identities: RwLock::new(Identities::default()),
        }
    }

    /// Connect as `account`. Reads the administrator from the ledger and
    /// returns the resulting role.
    pub async fn connect(&self, account: Address) -> Result<Role, LedgerError> {
        let admin = self.ledger.admin_address().await?;
        {
            let mut ids = self.identities.write();
            ids.account = Some(account);
            ids.admin = Some(admin);
        }
        let role = role_of(&account, &admin);
        tracing::info!(account = %account, %role, "session connected");
        Ok(role)
    }

    /// Switch to another account. The role is recomputed from a fresh
    /// administrator read.
    pub async fn reconnect(&self, account: Address) -> Result<Role, LedgerError> {
        let previous = self.identity();
        let role = self.connect(account).await?;
        if previous != Some(account) {
            tracing::info!(previous = ?previous, account = %account, "account switched");
        }
        Ok(role)
    }

    pub fn disconnect(&self) {
        let mut ids = self.identities.write();
        ids.account = None;
        ids.admin = None;
        tracing::info!("session disconnected");
    }

    /// The currently connected account.
    pub fn identity(&self) -> Option<Address> {
        self.identities.read().account
    }

    /// The administrator as read at the last connect.
    pub fn admin(&self) -> Option<Address> {
        self.identities.read().admin
    }

    pub fn role(&self) -> Option<Role> {
        let ids = self.identities.read();
        Some(role_of(&ids.account?, &ids.admin?))
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }
}

fn role_of(account: &Address, admin: &Address) -> Role {
    if authorize_review(account, admin) {
        Role::Admin
    } else {
        Role::Submitter
    }
}
