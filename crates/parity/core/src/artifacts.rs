//! Read-only inputs produced outside this tool: the wrapper's creation
//! bytecode and ABI, as emitted by `solc --bin --abi`.

use std::{
    fs,
    io,
    path::{
        Path,
        PathBuf,
    },
};

use alloy::{
    hex,
    primitives::Bytes,
};
use alloy_json_abi::JsonAbi;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("bytecode in {path} is not valid hex: {source}")]
    InvalidBytecode {
        path: PathBuf,
        #[source]
        source: hex::FromHexError,
    },
    #[error("bytecode in {path} is empty")]
    EmptyBytecode { path: PathBuf },
    #[error("ABI in {path} is not valid JSON: {source}")]
    InvalidAbi {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("deployed address in {path} is not a valid address: {value:?}")]
    InvalidAddress { path: PathBuf, value: String },
}

fn read_to_string(path: &Path) -> Result<String, ArtifactError> {
    fs::read_to_string(path).map_err(|source| {
        ArtifactError::Read {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Loads hex encoded creation bytecode. A `0x` prefix and surrounding
/// whitespace are accepted.
pub fn load_bytecode(path: &Path) -> Result<Bytes, ArtifactError> {
    let raw = read_to_string(path)?;
    let bytecode = hex::decode(raw.trim()).map_err(|source| {
        ArtifactError::InvalidBytecode {
            path: path.to_path_buf(),
            source,
        }
    })?;

    if bytecode.is_empty() {
        return Err(ArtifactError::EmptyBytecode {
            path: path.to_path_buf(),
        });
    }

    debug!(path = %path.display(), size = bytecode.len(), "Loaded bytecode");
    Ok(bytecode.into())
}

/// Loads a JSON ABI.
pub fn load_abi(path: &Path) -> Result<JsonAbi, ArtifactError> {
    let raw = read_to_string(path)?;
    let abi = serde_json::from_str(&raw).map_err(|source| {
        ArtifactError::InvalidAbi {
            path: path.to_path_buf(),
            source,
        }
    })?;
    debug!(path = %path.display(), "Loaded ABI");
    Ok(abi)
}
