//! Test inputs shared by every stage and the local SHA-256 oracle they are
//! checked against.

use alloy::primitives::B256;
use sha2::{
    Digest,
    Sha256,
};
use std::fmt;

/// Inputs exercised by the raw and wrapper stages, in order. The empty input
/// covers the zero-length calldata path of both the ABI encoder and the
/// precompile.
pub const DEFAULT_INPUTS: &[&str] = &[
    "hello world",
    "",
    "The quick brown fox jumps over the lazy dog",
    "cdk-erigon",
];

/// Longest prefix shown in status lines before the input is elided.
const LABEL_MAX_LEN: usize = 20;

/// SHA-256 of `input`, computed locally.
pub fn reference_hash(input: &[u8]) -> B256 {
    B256::from(<[u8; 32]>::from(Sha256::digest(input)))
}

/// A single input byte sequence fed to the precompile.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TestVector {
    input: Vec<u8>,
}

impl TestVector {
    pub fn new(input: impl Into<Vec<u8>>) -> Self {
        Self {
            input: input.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.input
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// The input as text, with invalid UTF-8 replaced. Used for result records.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.input).into_owned()
    }

    /// Short form for console output.
    pub fn label(&self) -> String {
        let text = self.text();
        if text.chars().count() > LABEL_MAX_LEN {
            let head: String = text.chars().take(LABEL_MAX_LEN).collect();
            format!("{head}...")
        } else {
            text
        }
    }

    pub fn reference_hash(&self) -> B256 {
        reference_hash(&self.input)
    }
}

impl From<&str> for TestVector {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl fmt::Display for TestVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.text())
    }
}

/// The ordered vector list built from [`DEFAULT_INPUTS`].
pub fn default_vectors() -> Vec<TestVector> {
    DEFAULT_INPUTS.iter().copied().map(TestVector::from).collect()
}
