//! # Submit: Apply for a business license.
//!
//! ```bash
//! licman submit --company-name "Acme Ltd" --company-address "1 Main St" --document incorporation.pdf
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use licman_client::Document;
use licman_core::LicenseRecord;
use licman_sync::{CacheSnapshot, LicenseCache, SubmissionDraft, SubmissionError, SubmissionSequencer};

use crate::context::{Context, GlobalArgs};
use crate::render;

/// Submit subcommand arguments.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Registered company name.
    #[arg(long)]
    pub company_name: String,

    /// Registered company address.
    #[arg(long)]
    pub company_address: String,

    /// Supporting document to upload.
    #[arg(long)]
    pub document: PathBuf,
}

/// Read `path` into an upload, named after its final component.
pub fn read_document(path: &std::path::Path) -> Result<Document> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read document: {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Document::new(file_name, bytes))
}

/// The record to show once a submission is confirmed: the refreshed copy,
/// or the sequencer's own if the refresh failed. The submission stands
/// either way.
fn settled_record(
    cache: &LicenseCache,
    refreshed: Result<CacheSnapshot>,
    record: LicenseRecord,
) -> LicenseRecord {
    if let Err(e) = refreshed {
        tracing::warn!(license = %record.id, "submission confirmed but refresh failed: {e:#}");
        return record;
    }
    cache.get(record.id).unwrap_or(record)
}

/// Execute the submit subcommand.
pub async fn run_submit(args: &SubmitArgs, global: &GlobalArgs) -> Result<u8> {
    let document = read_document(&args.document)?;
    let ctx = Context::connect(global).await?;
    let sequencer = SubmissionSequencer::new(Arc::clone(&ctx.store), ctx.cache.clone(), ctx.policy);
    let draft = SubmissionDraft::new(&args.company_name, &args.company_address, Some(document));

    let record = match sequencer.submit(&ctx.session, draft).await {
        Ok(record) => record,
        Err(e @ SubmissionError::Unresolved { .. }) => {
            // Registered and confirmed, but the new id could not be located.
            tracing::warn!("{e}");
            eprintln!("Submission confirmed; run `licman licenses --mine` to see its id.");
            return Ok(0);
        }
        Err(e) => return Err(e).context("submission failed"),
    };

    let record = settled_record(&ctx.cache, ctx.refresh().await, record);
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print!("{}", render::detail(&record, ctx.store.as_ref()));
    }
    Ok(0)
}
