//! Result records written by each stage and the files that carry state from
//! one stage to the next.

use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
};

use alloy::{
    hex,
    primitives::{
        Address,
        B256,
        TxHash,
    },
};
use parity_common::TestVector;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::debug;

use crate::{
    artifacts::ArtifactError,
    error::{
        ParityError,
        Result,
    },
};

pub const STAGE1_RESULTS_FILE: &str = "results_stage1.json";
pub const STAGE2_RESULTS_FILE: &str = "results_stage2.json";
pub const STAGE3_RESULTS_FILE: &str = "results_stage3.json";
pub const DEPLOYED_ADDRESS_FILE: &str = "deployed_address.txt";

/// Lowercase hex without prefix, the form digests take in result files.
pub fn digest_hex(bytes: impl AsRef<[u8]>) -> String {
    hex::encode(bytes)
}

/// Outcome of one raw call to the precompile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInvocationResult {
    pub input: String,
    pub expected_hash: String,
    pub returned_hash: Option<String>,
    #[serde(rename = "match")]
    pub matched: bool,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RawInvocationResult {
    /// Compares whatever the precompile returned against the reference. Any
    /// length other than 32 bytes is a mismatch.
    pub fn compared(vector: &TestVector, expected: B256, returned: &[u8]) -> Self {
        Self {
            input: vector.text(),
            expected_hash: digest_hex(expected),
            returned_hash: Some(digest_hex(returned)),
            matched: returned == expected.as_slice(),
            success: true,
            error: None,
        }
    }

    pub fn failed(vector: &TestVector, expected: B256, error: String) -> Self {
        Self {
            input: vector.text(),
            expected_hash: digest_hex(expected),
            returned_hash: None,
            matched: false,
            success: false,
            error: Some(error),
        }
    }
}

/// Everything stage 1 writes to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInvocationReport {
    pub stage: String,
    pub precompile: Address,
    pub network: String,
    pub rpc_url: String,
    pub chain_id: Option<u64>,
    pub timestamp: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub results: Vec<RawInvocationResult>,
}

impl RawInvocationReport {
    pub fn mismatches(&self) -> usize {
        self.results.iter().filter(|result| !result.matched).count()
    }
}

/// Outcome of the wrapper deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub block_number: u64,
    pub transaction_hash: TxHash,
    pub contract_address: Address,
    pub gas_used: u64,
    pub bytecode_size: usize,
    pub status: u64,
    pub verification_pass: bool,
}

/// Outcome of calling the wrapper with one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    pub input: String,
    pub expected_hash: String,
    pub returned_hash: Option<String>,
    #[serde(rename = "match")]
    pub matched: bool,
    pub contract_address: Address,
    pub wrapper_call_success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvocationResult {
    pub fn compared(
        vector: &TestVector,
        contract: Address,
        expected: B256,
        returned: B256,
    ) -> Self {
        Self {
            input: vector.text(),
            expected_hash: digest_hex(expected),
            returned_hash: Some(digest_hex(returned)),
            matched: returned == expected,
            contract_address: contract,
            wrapper_call_success: true,
            error: None,
        }
    }

    pub fn failed(vector: &TestVector, contract: Address, expected: B256, error: String) -> Self {
        Self {
            input: vector.text(),
            expected_hash: digest_hex(expected),
            returned_hash: None,
            matched: false,
            contract_address: contract,
            wrapper_call_success: false,
            error: Some(error),
        }
    }
}

/// Turns a count of mismatching results into the stage's final verdict.
pub fn ensure_all_matched(stage: &'static str, mismatched: usize, total: usize) -> Result<()> {
    if mismatched == 0 {
        Ok(())
    } else {
        Err(ParityError::Mismatch {
            stage,
            mismatched,
            total,
        })
    }
}

/// File locations inside the working directory.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    dir: PathBuf,
}

impl OutputPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stage1_results(&self) -> PathBuf {
        self.dir.join(STAGE1_RESULTS_FILE)
    }

    pub fn stage2_results(&self) -> PathBuf {
        self.dir.join(STAGE2_RESULTS_FILE)
    }

    pub fn stage3_results(&self) -> PathBuf {
        self.dir.join(STAGE3_RESULTS_FILE)
    }

    pub fn deployed_address(&self) -> PathBuf {
        self.dir.join(DEPLOYED_ADDRESS_FILE)
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| ParityError::write(parent, source))
        }
        _ => Ok(()),
    }
}

/// Writes `value` as two-space indented JSON.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    fs::write(path, json).map_err(|source| ParityError::write(path, source))?;
    debug!(path = %path.display(), "Wrote results");
    Ok(())
}

/// Writes the checksummed address without a trailing newline.
pub fn write_deployed_address(path: &Path, address: Address) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, address.to_checksum(None))
        .map_err(|source| ParityError::write(path, source))
}

/// Reads the hand-off address; surrounding whitespace is ignored.
pub fn read_deployed_address(path: &Path) -> Result<Address, ArtifactError> {
    let raw = fs::read_to_string(path).map_err(|source| {
        ArtifactError::Read {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let value = raw.trim();
    Address::from_str(value).map_err(|_| {
        ArtifactError::InvalidAddress {
            path: path.to_path_buf(),
            value: value.to_string(),
        }
    })
}
