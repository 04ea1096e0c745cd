//! # Deploy: Instantiate the license contract.
//!
//! ```bash
//! licman deploy --artifact artifacts/contracts/BusinessLicense.sol/BusinessLicense.json
//! licman deploy --artifact BusinessLicense.json --admin 0x70997970c51812dc3a010c7d01b50e0d17dc79c8 --out contract.txt
//! ```
//!
//! The deployer defaults to the node's first account and also becomes the
//! administrator unless `--admin` is given. The contract address is the only
//! thing printed to stdout.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use licman_client::{abi, wait_for_confirmation, EvmLedger};
use licman_core::Address;
use serde::Deserialize;

use crate::context::{resolve_account, GlobalArgs};

/// Deploy subcommand arguments.
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Compiled contract artifact (JSON with a `bytecode` field).
    #[arg(long)]
    pub artifact: PathBuf,

    /// Administrator passed to the constructor. Defaults to the deployer.
    #[arg(long)]
    pub admin: Option<String>,

    /// Also write the deployed address to this file.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Deserialize)]
struct Artifact {
    #[serde(rename = "contractName", default)]
    contract_name: Option<String>,
    bytecode: String,
}

/// Read the creation bytecode from a compiled artifact.
pub fn load_bytecode(path: &Path) -> Result<Vec<u8>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read artifact: {}", path.display()))?;
    let artifact: Artifact = serde_json::from_str(&raw)
        .with_context(|| format!("artifact is not valid JSON: {}", path.display()))?;
    let bytecode = abi::from_hex(artifact.bytecode.trim())
        .with_context(|| format!("artifact bytecode is not hex: {}", path.display()))?;
    if bytecode.is_empty() {
        bail!(
            "artifact {} has no bytecode (abstract contract or interface?)",
            artifact.contract_name.as_deref().unwrap_or("<unnamed>")
        );
    }
    Ok(bytecode)
}

/// Execute the deploy subcommand.
pub async fn run_deploy(args: &DeployArgs, global: &GlobalArgs) -> Result<u8> {
    let bytecode = load_bytecode(&args.artifact)?;
    let config = global.ledger_config()?;
    let policy = config.confirmation;
    let ledger = EvmLedger::new(config)?;
    ledger.check_chain().await.context("connecting to ledger")?;

    let deployer = resolve_account(&ledger, global.account()?).await?;
    let admin = match &args.admin {
        Some(raw) => Address::parse(raw).context("invalid --admin")?,
        None => deployer,
    };
    tracing::info!(deployer = %deployer, admin = %admin, bytes = bytecode.len(), "deploying license contract");

    let tx = ledger
        .deploy(deployer, &bytecode, admin)
        .await
        .context("sending contract creation transaction")?;
    let receipt = tokio::time::timeout(
        policy.timeout,
        wait_for_confirmation(&ledger, &tx, policy.poll_interval),
    )
    .await
    .with_context(|| format!("deployment {tx} not confirmed within {:?}", policy.timeout))?
    .with_context(|| format!("deployment {tx} failed"))?;
    let contract = receipt
        .contract_address
        .with_context(|| format!("receipt for {tx} carries no contract address"))?;

    tracing::info!(contract = %contract, block = receipt.block_number, "license contract deployed");
    println!("{contract}");

    if let Some(out) = &args.out {
        std::fs::write(out, format!("{contract}\n"))
            .with_context(|| format!("failed to write {}", out.display()))?;
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn artifact(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_bytecode_from_artifact() {
        let file = artifact(r#"{"contractName":"BusinessLicense","abi":[],"bytecode":"0x6080604052"}"#);
        assert_eq!(load_bytecode(file.path()).unwrap(), vec![0x60, 0x80, 0x60, 0x40, 0x52]);
    }

    #[test]
    fn empty_bytecode_is_rejected() {
        let file = artifact(r#"{"contractName":"ILicense","bytecode":"0x"}"#);
        let err = load_bytecode(file.path()).unwrap_err();
        assert!(err.to_string().contains("ILicense"));
    }

    #[test]
    fn malformed_artifacts_are_rejected() {
        assert!(load_bytecode(artifact("not json").path()).is_err());
        assert!(load_bytecode(artifact(r#"{"abi":[]}"#).path()).is_err());
        assert!(load_bytecode(artifact(r#"{"bytecode":"6080"}"#).path()).is_err());
    }

    #[test]
    fn missing_artifact_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = load_bytecode(&path).unwrap_err();
        assert!(format!("{err:#}").contains("missing.json"));
    }
}
