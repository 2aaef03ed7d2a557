use std::{
    io,
    path::PathBuf,
    time::Duration,
};

use alloy::primitives::{
    Address,
    TxHash,
};
use thiserror::Error;

use crate::{
    artifacts::ArtifactError,
    node::NodeError,
};

pub type Result<T, E = ParityError> = std::result::Result<T, E>;

/// Fatal conditions that abort a stage.
#[derive(Debug, Error)]
pub enum ParityError {
    #[error("DEPLOYER_PRIVATE_KEY is not set (pass --private-key or set it in .env)")]
    MissingPrivateKey,
    #[error("invalid deployer private key: {0}")]
    InvalidPrivateKey(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Node(#[from] NodeError),
    #[error("node reports chain id {node}, but chain id {expected} was expected")]
    ChainIdMismatch { node: u64, expected: u64 },
    #[error("failed to sign deployment transaction: {0}")]
    Signing(#[from] alloy::signers::Error),
    #[error("deployment transaction {tx_hash} was not mined within {timeout:?}")]
    ReceiptTimeout { tx_hash: TxHash, timeout: Duration },
    #[error(
        "contract deployment reverted: transaction {tx_hash} in block {block_number}, gas used {gas_used}"
    )]
    DeploymentReverted {
        tx_hash: TxHash,
        block_number: u64,
        gas_used: u64,
    },
    #[error("receipt reports contract address {reported}, but sender and nonce derive {derived}")]
    AddressMismatch { reported: Address, derived: Address },
    #[error("no contract code found at {0}")]
    EmptyCode(Address),
    #[error("ABI has no `{0}(bytes)` function")]
    MissingEntryPoint(String),
    #[error("ABI coding failed: {0}")]
    Abi(#[from] alloy_dyn_abi::Error),
    #[error("wrapper returned {0}, expected a single bytes32")]
    UnexpectedOutput(String),
    #[error("precompile call at {precompile} failed for input {input:?}: {source}")]
    PrecompileCall {
        precompile: Address,
        input: String,
        #[source]
        source: NodeError,
    },
    #[error("{stage}: {mismatched} of {total} results did not match the reference hash")]
    Mismatch {
        stage: &'static str,
        mismatched: usize,
        total: usize,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize results: {0}")]
    Json(#[from] serde_json::Error),
}

impl ParityError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}
