//! # licman CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers on a
//! single-threaded runtime.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use licman_cli::context::GlobalArgs;
use licman_cli::deploy::{run_deploy, DeployArgs};
use licman_cli::document::{run_document, DocumentArgs};
use licman_cli::licenses::{run_licenses, LicensesArgs};
use licman_cli::review::{run_review, ReviewArgs};
use licman_cli::submit::{run_submit, SubmitArgs};

/// Business license registry client.
///
/// Submits license applications backed by content-addressed documents and
/// lets the contract administrator approve or reject them.
#[derive(Parser, Debug)]
#[command(name = "licman", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deploy the license contract and print its address.
    Deploy(DeployArgs),

    /// List licenses visible to the connected account.
    Licenses(LicensesArgs),

    /// Submit a license application.
    Submit(SubmitArgs),

    /// Approve or reject a pending license.
    Review(ReviewArgs),

    /// Show or download a submitted document.
    Document(DocumentArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to start runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let global = &cli.global;
    let result = runtime.block_on(async {
        match &cli.command {
            Commands::Deploy(args) => run_deploy(args, global).await,
            Commands::Licenses(args) => run_licenses(args, global).await,
            Commands::Submit(args) => run_submit(args, global).await,
            Commands::Review(args) => run_review(args, global).await,
            Commands::Document(args) => run_document(args, global).await,
        }
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
