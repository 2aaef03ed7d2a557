#![allow(dead_code)]

use std::{
    fs,
    net::TcpListener,
    path::Path,
    str::FromStr,
};

use alloy::{
    primitives::Address,
    signers::local::PrivateKeySigner,
};
use int_test_utils::{
    ANVIL_DEPLOYER_KEY,
    MockNode,
};
use parity_common::args::CliArgs;
use parity_core::{
    config::{
        ArtifactArgs,
        DeployerArgs,
        NodeArgs,
    },
    results::OutputPaths,
};
use serde_json::Value;
use tempfile::TempDir;

pub const CHAIN_ID: u64 = 10101;

/// Creation bytecode; the mock node only needs it to be non-empty.
pub const WRAPPER_BIN: &str = "0x6080604052348015600e575f80fd5b50\n";

pub const WRAPPER_ABI: &str = r#"[
  {
    "inputs": [{ "internalType": "bytes", "name": "data", "type": "bytes" }],
    "name": "sha256Hash",
    "outputs": [{ "internalType": "bytes32", "name": "", "type": "bytes32" }],
    "stateMutability": "view",
    "type": "function"
  }
]"#;

/// A running mock node plus isolated work and artifact directories.
pub struct TestHarness {
    pub node: MockNode,
    pub work_dir: TempDir,
    pub artifacts_dir: TempDir,
}

impl TestHarness {
    pub async fn start() -> Self {
        let node = MockNode::start(CHAIN_ID).await.unwrap();
        let artifacts_dir = TempDir::new().unwrap();
        fs::write(artifacts_dir.path().join("Sha256Wrapper.bin"), WRAPPER_BIN).unwrap();
        fs::write(artifacts_dir.path().join("Sha256Wrapper.abi"), WRAPPER_ABI).unwrap();

        Self {
            node,
            work_dir: TempDir::new().unwrap(),
            artifacts_dir,
        }
    }

    pub fn cli_args(&self) -> CliArgs {
        CliArgs {
            json: false,
            work_dir: self.work_dir.path().to_path_buf(),
        }
    }

    pub fn paths(&self) -> OutputPaths {
        OutputPaths::new(self.work_dir.path())
    }

    pub fn node_args(&self) -> NodeArgs {
        NodeArgs {
            rpc_host: self.node.host().to_string(),
            rpc_port: self.node.port(),
            rpc_timeout_seconds: 5,
            expected_chain_id: None,
        }
    }

    pub fn artifact_args(&self) -> ArtifactArgs {
        ArtifactArgs {
            artifacts_dir: self.artifacts_dir.path().to_path_buf(),
            ..ArtifactArgs::default()
        }
    }

    pub fn deployer_args(&self) -> DeployerArgs {
        DeployerArgs {
            private_key: Some(format!("0x{ANVIL_DEPLOYER_KEY}")),
            poll_interval_ms: 10,
            receipt_timeout_seconds: 5,
        }
    }

    pub fn deployer(&self) -> Address {
        PrivateKeySigner::from_str(ANVIL_DEPLOYER_KEY)
            .unwrap()
            .address()
    }
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

/// Node settings pointing at a port nothing listens on.
pub fn unreachable_node() -> NodeArgs {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    NodeArgs {
        rpc_port: port,
        rpc_timeout_seconds: 2,
        ..NodeArgs::default()
    }
}
