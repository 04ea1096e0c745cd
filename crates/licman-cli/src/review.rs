//! # Review: Approve or reject a pending license (administrator only).

use anyhow::{Context as _, Result};
use clap::{ArgGroup, Args};
use licman_core::LicenseId;
use licman_sync::Reviewer;

use crate::context::{Context, GlobalArgs};
use crate::render;

/// Review subcommand arguments.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("decision").required(true).args(["approve", "reject"])))]
pub struct ReviewArgs {
    /// License to decide on.
    #[arg(long)]
    pub id: u64,

    /// Approve the license.
    #[arg(long)]
    pub approve: bool,

    /// Reject the license.
    #[arg(long)]
    pub reject: bool,
}

/// Execute the review subcommand.
pub async fn run_review(args: &ReviewArgs, global: &GlobalArgs) -> Result<u8> {
    let ctx = Context::connect(global).await?;
    ctx.refresh().await?;

    let id = LicenseId(args.id);
    let reviewer = Reviewer::new(ctx.cache.clone(), ctx.policy);
    let record = reviewer
        .review(&ctx.session, id, args.approve)
        .await
        .with_context(|| format!("review of license {id} failed"))?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print!("{}", render::detail(&record, ctx.store.as_ref()));
    }
    Ok(0)
}
