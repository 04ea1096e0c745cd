//! Connection options shared by every subcommand, and the connected
//! context built from them.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use licman_client::{
    ConfirmationPolicy, ContentStoreConfig, EvmLedger, IpfsContentStore, LedgerConfig,
};
use licman_core::Address;
use licman_sync::{CacheSnapshot, LicenseCache, Role, Session};
use url::Url;

/// Endpoint and identity options.
///
/// Endpoint flags override the `LICMAN_*` variables read by
/// [`LedgerConfig::from_env`] and [`ContentStoreConfig::from_env`], which
/// are the only place those variables are read. `--account` falls back to
/// `LICMAN_ACCOUNT`.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Ledger JSON-RPC endpoint.
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    /// License contract address.
    #[arg(long, global = true)]
    pub contract: Option<String>,

    /// Account to act as. Defaults to the node's first account.
    #[arg(long, global = true, env = "LICMAN_ACCOUNT")]
    pub account: Option<String>,

    /// IPFS HTTP API base URL.
    #[arg(long, global = true)]
    pub ipfs_api: Option<String>,

    /// IPFS gateway base URL.
    #[arg(long, global = true)]
    pub ipfs_gateway: Option<String>,

    /// Emit JSON instead of tables.
    #[arg(long, global = true)]
    pub json: bool,
}

impl GlobalArgs {
    pub fn ledger_config(&self) -> Result<LedgerConfig> {
        let mut config = LedgerConfig::from_env()?;
        if let Some(raw) = &self.rpc_url {
            config.rpc_url = Url::parse(raw).with_context(|| format!("invalid --rpc-url {raw:?}"))?;
        }
        if let Some(raw) = &self.contract {
            config.contract_address = Some(Address::parse(raw)?);
        }
        Ok(config)
    }

    pub fn content_config(&self) -> Result<ContentStoreConfig> {
        let mut config = ContentStoreConfig::from_env()?;
        if let Some(raw) = &self.ipfs_api {
            config.api_url = Url::parse(raw).with_context(|| format!("invalid --ipfs-api {raw:?}"))?;
        }
        if let Some(raw) = &self.ipfs_gateway {
            config.gateway_url =
                Url::parse(raw).with_context(|| format!("invalid --ipfs-gateway {raw:?}"))?;
        }
        Ok(config)
    }

    pub fn account(&self) -> Result<Option<Address>> {
        Ok(self.account.as_deref().map(Address::parse).transpose()?)
    }
}

/// Pick `explicit`, else the node's first unlocked account.
pub async fn resolve_account(ledger: &EvmLedger, explicit: Option<Address>) -> Result<Address> {
    if let Some(account) = explicit {
        return Ok(account);
    }
    ledger
        .accounts()
        .await
        .context("listing node accounts")?
        .first()
        .copied()
        .context("node exposes no accounts; pass --account")
}

/// A connected session with its cache and content store.
pub struct Context {
    pub ledger: Arc<EvmLedger>,
    pub store: Arc<IpfsContentStore>,
    pub cache: LicenseCache,
    pub session: Session<EvmLedger>,
    pub policy: ConfirmationPolicy,
    pub role: Role,
    pub json: bool,
}

impl Context {
    /// Connect to the ledger and content store and resolve the acting
    /// account's role.
    pub async fn connect(args: &GlobalArgs) -> Result<Self> {
        let config = args.ledger_config()?;
        config.require_contract()?;
        let policy = config.confirmation;
        let ledger = Arc::new(EvmLedger::new(config)?);
        ledger.check_chain().await.context("connecting to ledger")?;

        let account = resolve_account(&ledger, args.account()?).await?;
        let session = Session::new(Arc::clone(&ledger));
        let role = session
            .connect(account)
            .await
            .context("reading contract administrator")?;

        let store = Arc::new(IpfsContentStore::new(args.content_config()?)?);
        Ok(Self {
            ledger,
            store,
            cache: LicenseCache::new(),
            session,
            policy,
            role,
            json: args.json,
        })
    }

    /// The connected account.
    pub fn account(&self) -> Result<Address> {
        self.session.identity().context("session is not connected")
    }

    /// Reconcile the cache. Per-record failures are logged, not returned.
    pub async fn refresh(&self) -> Result<CacheSnapshot> {
        let snapshot = self.cache.reconcile(self.ledger.as_ref()).await?;
        if let Some(partial) = snapshot.partial_failure() {
            for failure in &partial.failures {
                tracing::warn!("{failure}");
            }
            tracing::warn!("{partial}");
        }
        Ok(snapshot)
    }
}
