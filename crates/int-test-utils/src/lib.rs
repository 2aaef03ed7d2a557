#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]

mod mock_node;
pub use mock_node::{
    MockNode,
    SHA256_PRECOMPILE,
    WRAPPER_SIGNATURE,
    WrapperFault,
};

/// Anvil's first default account, funded on every local devnet.
pub const ANVIL_DEPLOYER_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
