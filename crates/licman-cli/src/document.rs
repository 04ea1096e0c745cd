//! # Document: Fetch a submitted document from the content store.
//!
//! Without `--output` only the gateway link is printed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use licman_client::{ContentStore, IpfsContentStore};
use licman_core::ContentAddress;

use crate::context::GlobalArgs;

/// Document subcommand arguments.
#[derive(Args, Debug)]
pub struct DocumentArgs {
    /// Content address of the document.
    #[arg(long)]
    pub cid: String,

    /// Download the document to this path.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Execute the document subcommand.
pub async fn run_document(args: &DocumentArgs, global: &GlobalArgs) -> Result<u8> {
    // Accept whatever a listing showed, including `<cid>/<file>` paths.
    let cid = ContentAddress::from_ledger(args.cid.as_str());
    let store = IpfsContentStore::new(global.content_config()?)?;

    let Some(output) = &args.output else {
        let link = store
            .link(&cid)
            .with_context(|| format!("{:?} has no gateway link", cid.as_str()))?;
        println!("{link}");
        return Ok(0);
    };
    let bytes = store
        .get(&cid)
        .await
        .with_context(|| format!("failed to fetch {cid}"))?;
    std::fs::write(output, &bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!(cid = %cid, bytes = bytes.len(), path = %output.display(), "document saved");
    Ok(0)
}
