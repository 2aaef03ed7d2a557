//! Command-line and environment configuration shared by the stages.
//!
//! Every flag has an env var counterpart so a devnet `.env` file is enough to
//! drive all stages without shell arguments.

use std::{
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
    time::Duration,
};

use alloy::{
    hex,
    primitives::Address,
    signers::local::PrivateKeySigner,
};
use clap::{
    Args,
    ValueHint,
};
use tracing::warn;

use crate::{
    deploy::DeployOptions,
    error::{
        ParityError,
        Result,
    },
    node::NodeClient,
};

pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 63311;
pub const DEFAULT_CONTRACT_NAME: &str = "Sha256Wrapper";
pub const DEFAULT_NETWORK_NAME: &str = "cdk-erigon";

/// Where the execution node is and how long to wait for it.
#[derive(Debug, Clone, Args)]
pub struct NodeArgs {
    /// Host of the node's JSON-RPC endpoint
    #[arg(long, env = "RPC_HOST", default_value = DEFAULT_RPC_HOST)]
    pub rpc_host: String,

    /// Port of the node's JSON-RPC endpoint
    #[arg(long, env = "RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Upper bound on the initial connectivity check
    #[arg(long, env = "RPC_TIMEOUT_SECONDS", default_value_t = 10)]
    pub rpc_timeout_seconds: u64,

    /// Chain id the node must report. The node's value is always used for
    /// signing; this only guards against pointing at the wrong network.
    #[arg(long = "chain-id", env = "EXPECTED_CHAIN_ID")]
    pub expected_chain_id: Option<u64>,
}

impl Default for NodeArgs {
    fn default() -> Self {
        Self {
            rpc_host: DEFAULT_RPC_HOST.to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            rpc_timeout_seconds: 10,
            expected_chain_id: None,
        }
    }
}

impl NodeArgs {
    pub fn rpc_url(&self) -> String {
        format!("http://{}:{}", self.rpc_host, self.rpc_port)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_seconds)
    }

    /// Connects and checks the reported chain id against `--chain-id`.
    pub async fn connect(&self) -> Result<NodeClient> {
        let node = NodeClient::connect(&self.rpc_url(), self.rpc_timeout()).await?;
        check_chain_id(node.chain_id(), self.expected_chain_id)?;
        Ok(node)
    }
}

pub(crate) fn check_chain_id(node: u64, expected: Option<u64>) -> Result<()> {
    match expected {
        Some(expected) if expected != node => {
            Err(ParityError::ChainIdMismatch { node, expected })
        }
        _ => Ok(()),
    }
}

/// Location of the compiled wrapper contract.
#[derive(Debug, Clone, Args)]
pub struct ArtifactArgs {
    /// Directory holding `<contract>.bin` and `<contract>.abi`
    #[arg(
        long,
        env = "ARTIFACTS_DIR",
        default_value = "artifacts",
        value_hint = ValueHint::DirPath
    )]
    pub artifacts_dir: PathBuf,

    /// Base name of the compiled wrapper contract
    #[arg(long, env = "CONTRACT_NAME", default_value = DEFAULT_CONTRACT_NAME)]
    pub contract_name: String,
}

impl Default for ArtifactArgs {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            contract_name: DEFAULT_CONTRACT_NAME.to_string(),
        }
    }
}

impl ArtifactArgs {
    pub fn bytecode_path(&self) -> PathBuf {
        self.artifacts_dir.join(format!("{}.bin", self.contract_name))
    }

    pub fn abi_path(&self) -> PathBuf {
        self.artifacts_dir.join(format!("{}.abi", self.contract_name))
    }
}

/// Signing key and confirmation policy for the deployment.
#[derive(Debug, Clone, Args)]
pub struct DeployerArgs {
    /// Deployer private key, hex with or without `0x`
    #[arg(long, env = "DEPLOYER_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Delay between receipt lookups
    #[arg(long, env = "RECEIPT_POLL_INTERVAL_MS", default_value_t = 2_000)]
    pub poll_interval_ms: u64,

    /// Give up waiting for the receipt after this long
    #[arg(long, env = "RECEIPT_TIMEOUT_SECONDS", default_value_t = 180)]
    pub receipt_timeout_seconds: u64,
}

impl Default for DeployerArgs {
    fn default() -> Self {
        Self {
            private_key: None,
            poll_interval_ms: 2_000,
            receipt_timeout_seconds: 180,
        }
    }
}

impl DeployerArgs {
    pub fn signer(&self) -> Result<PrivateKeySigner> {
        load_signer(self.private_key.as_deref())
    }

    pub fn options(&self) -> DeployOptions {
        DeployOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            receipt_timeout: Duration::from_secs(self.receipt_timeout_seconds),
            ..DeployOptions::default()
        }
    }
}

/// Parses the deployer key. Blank and absent keys are both reported as
/// missing.
pub fn load_signer(private_key: Option<&str>) -> Result<PrivateKeySigner> {
    let key = private_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(ParityError::MissingPrivateKey)?;
    let key = key.strip_prefix("0x").unwrap_or(key);

    PrivateKeySigner::from_str(key).map_err(|err| ParityError::InvalidPrivateKey(err.to_string()))
}

/// Parses a precompile address given in short form (`0x02`) or full form.
pub fn parse_precompile_address(value: &str) -> Result<Address, String> {
    let digits = value.trim().trim_start_matches("0x");
    if digits.is_empty() || digits.len() > 40 {
        return Err(format!("{value:?} is not a 20 byte address"));
    }

    let padded = format!("{digits:0>40}");
    let bytes = hex::decode(&padded).map_err(|err| format!("{value:?} is not hex: {err}"))?;
    Ok(Address::from_slice(&bytes))
}

/// Loads `.env` from the working directory into the process environment
/// before arguments are parsed. A missing file is not an error.
pub fn load_dotenv() {
    report_dotenv(dotenv::dotenv().map(|_| ()));
}

/// Same as [`load_dotenv`], for an explicit file.
pub fn load_dotenv_from(path: &Path) {
    report_dotenv(dotenv::from_path(path));
}

fn report_dotenv(result: dotenv::Result<()>) {
    match result {
        Ok(()) => {}
        Err(dotenv::Error::Io(_)) => {}
        Err(err) => warn!(error = %err, "Ignoring malformed .env file"),
    }
}
