//! # Licenses: Show the connected account's view of the ledger.
//!
//! The administrator sees every record; anyone else sees their own
//! submissions. `--mine` forces the submitter view, `--id` shows one record
//! in full.

use anyhow::{bail, Result};
use clap::Args;
use licman_core::LicenseId;
use licman_sync::{project_admin_view, project_submitter_view, Role};

use crate::context::{Context, GlobalArgs};
use crate::render;

/// Licenses subcommand arguments.
#[derive(Args, Debug)]
pub struct LicensesArgs {
    /// Show a single license in full.
    #[arg(long)]
    pub id: Option<u64>,

    /// Show only licenses submitted by the connected account, even when it
    /// is the administrator.
    #[arg(long)]
    pub mine: bool,
}

/// Execute the licenses subcommand.
pub async fn run_licenses(args: &LicensesArgs, global: &GlobalArgs) -> Result<u8> {
    let ctx = Context::connect(global).await?;
    ctx.refresh().await?;
    let account = ctx.account()?;

    if let Some(raw) = args.id {
        let id = LicenseId(raw);
        let record = ctx.cache.get(id)?;
        if ctx.role != Role::Admin && !record.submitted_by(&account) {
            bail!("license {id} was not submitted by {account}");
        }
        if ctx.json {
            println!("{}", serde_json::to_string_pretty(&record)?);
        } else {
            print!("{}", render::detail(&record, ctx.store.as_ref()));
        }
        return Ok(0);
    }

    if ctx.role == Role::Admin && !args.mine {
        let rows = render::admin_rows(&project_admin_view(&ctx.cache), ctx.store.as_ref());
        if ctx.json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        } else {
            print!("{}", render::admin_table(&rows));
        }
    } else {
        let rows = render::submitter_rows(&project_submitter_view(&ctx.cache, &account));
        if ctx.json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        } else {
            print!("{}", render::submitter_table(&rows));
        }
    }
    Ok(0)
}
