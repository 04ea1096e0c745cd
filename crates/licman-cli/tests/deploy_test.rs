//! # Integration Tests for `licman deploy`
//!
//! Drives the deploy handler against a wiremock JSON-RPC node: artifact
//! loading, deployer and administrator selection, confirmation, and the
//! optional address file.

use std::io::Write;

use licman_cli::context::GlobalArgs;
use licman_cli::deploy::{run_deploy, DeployArgs};
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEPLOYER: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
const OTHER_ADMIN: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";
const CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
const TX: &str = "0x00000000000000000000000000000000000000000000000000000000000000aa";

fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

fn address_word(address: &str) -> String {
    format!("{:0>64}", address.trim_start_matches("0x"))
}

fn artifact() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(br#"{"contractName":"BusinessLicense","abi":[],"bytecode":"0x6080604052"}"#)
        .unwrap();
    file
}

async fn node(status: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_chainId" })))
        .respond_with(rpc_result(json!("0x7a69")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_accounts" })))
        .respond_with(rpc_result(json!([DEPLOYER, OTHER_ADMIN])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_getTransactionReceipt" })))
        .respond_with(rpc_result(json!({
            "transactionHash": TX,
            "blockNumber": "0x1",
            "status": status,
            "contractAddress": CONTRACT
        })))
        .mount(&server)
        .await;
    server
}

fn global(server: &MockServer) -> GlobalArgs {
    GlobalArgs {
        rpc_url: Some(server.uri()),
        ..GlobalArgs::default()
    }
}

#[tokio::test]
async fn deployer_is_first_account_and_default_admin() {
    let server = node("0x1").await;
    let expected_data = format!("0x6080604052{}", address_word(DEPLOYER));
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_sendTransaction",
            "params": [{ "from": DEPLOYER, "data": expected_data }]
        })))
        .respond_with(rpc_result(json!(TX)))
        .expect(1)
        .mount(&server)
        .await;

    let file = artifact();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("contract-address.txt");
    let args = DeployArgs {
        artifact: file.path().to_path_buf(),
        admin: None,
        out: Some(out.clone()),
    };

    let code = run_deploy(&args, &global(&server)).await.expect("deploy");
    assert_eq!(code, 0);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), format!("{CONTRACT}\n"));
}

#[tokio::test]
async fn explicit_admin_is_passed_to_constructor() {
    let server = node("0x1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendTransaction" })))
        .and(body_string_contains(address_word(OTHER_ADMIN)))
        .respond_with(rpc_result(json!(TX)))
        .expect(1)
        .mount(&server)
        .await;

    let file = artifact();
    let args = DeployArgs {
        artifact: file.path().to_path_buf(),
        admin: Some(OTHER_ADMIN.to_uppercase().replacen("0X", "0x", 1)),
        out: None,
    };
    assert_eq!(run_deploy(&args, &global(&server)).await.expect("deploy"), 0);
}

#[tokio::test]
async fn reverted_deployment_fails() {
    let server = node("0x0").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendTransaction" })))
        .respond_with(rpc_result(json!(TX)))
        .mount(&server)
        .await;

    let file = artifact();
    let args = DeployArgs {
        artifact: file.path().to_path_buf(),
        admin: None,
        out: None,
    };
    let err = run_deploy(&args, &global(&server)).await.unwrap_err();
    assert!(format!("{err:#}").contains("reverted"));
}

#[tokio::test]
async fn wrong_chain_is_refused_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_chainId" })))
        .respond_with(rpc_result(json!("0x1")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendTransaction" })))
        .respond_with(rpc_result(json!(TX)))
        .expect(0)
        .mount(&server)
        .await;

    let file = artifact();
    let args = DeployArgs {
        artifact: file.path().to_path_buf(),
        admin: None,
        out: None,
    };
    assert!(run_deploy(&args, &global(&server)).await.is_err());
}
