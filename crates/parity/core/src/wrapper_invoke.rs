//! Stage 3: call the deployed wrapper's `sha256Hash(bytes)` with each test
//! input and compare the returned word with the local digest.

use alloy::primitives::{
    Address,
    B256,
    Bytes,
};
use alloy_dyn_abi::{
    DynSolValue,
    FunctionExt,
    JsonAbiExt,
};
use alloy_json_abi::{
    Function,
    JsonAbi,
};
use clap::Parser;
use colored::Colorize;
use parity_common::{
    TestVector,
    args::CliArgs,
    default_vectors,
};
use tracing::{
    error,
    info,
};

use crate::{
    artifacts::load_abi,
    config::{
        ArtifactArgs,
        NodeArgs,
    },
    deploy::ensure_code,
    error::{
        ParityError,
        Result,
    },
    node::NodeClient,
    results::{
        InvocationResult,
        OutputPaths,
        ensure_all_matched,
        read_deployed_address,
        write_json,
    },
};

pub const ENTRY_POINT: &str = "sha256Hash";

/// The wrapper's single entry point, resolved from its JSON ABI.
#[derive(Debug, Clone)]
pub struct WrapperAbi {
    function: Function,
}

impl WrapperAbi {
    /// Picks the `sha256Hash` overload that takes exactly one `bytes`.
    pub fn from_json_abi(abi: &JsonAbi) -> Result<Self> {
        abi.function(ENTRY_POINT)
            .and_then(|overloads| {
                overloads
                    .iter()
                    .find(|f| f.inputs.len() == 1 && f.inputs[0].ty == "bytes")
            })
            .cloned()
            .map(|function| Self { function })
            .ok_or_else(|| ParityError::MissingEntryPoint(ENTRY_POINT.to_string()))
    }

    pub fn signature(&self) -> String {
        self.function.signature()
    }

    pub fn encode_call(&self, input: &[u8]) -> Result<Bytes> {
        let calldata = self
            .function
            .abi_encode_input(&[DynSolValue::Bytes(input.to_vec())])?;
        Ok(calldata.into())
    }

    /// Decodes the return data, which must be exactly one `bytes32`.
    pub fn decode_hash(&self, output: &[u8]) -> Result<B256> {
        let values = self.function.abi_decode_output(output)?;
        match values.as_slice() {
            [DynSolValue::FixedBytes(word, 32)] => Ok(*word),
            other => Err(ParityError::UnexpectedOutput(format!("{other:?}"))),
        }
    }
}

/// Call the deployed wrapper with each test input.
#[derive(Debug, Clone, Parser)]
#[clap(
    name = "wrapper",
    about = "Call the deployed wrapper contract and compare against local digests."
)]
pub struct WrapperArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    /// Wrapper address; read from `deployed_address.txt` when omitted
    #[arg(long, env = "WRAPPER_ADDRESS")]
    pub address: Option<Address>,
}

impl WrapperArgs {
    pub async fn run(&self, cli_args: &CliArgs) -> Result<Vec<InvocationResult>> {
        let paths = OutputPaths::new(cli_args.work_dir());
        let address = match self.address {
            Some(address) => address,
            None => read_deployed_address(&paths.deployed_address())?,
        };
        let wrapper = WrapperAbi::from_json_abi(&load_abi(&self.artifacts.abi_path())?)?;
        info!(%address, function = %wrapper.signature(), "Loaded wrapper");

        let node = self.node.connect().await?;
        let results = execute(&node, &wrapper, address, &paths).await?;

        display_results(&results, address, cli_args.json_output())?;
        let mismatches = results.iter().filter(|r| !r.matched).count();
        ensure_all_matched("stage 3", mismatches, results.len())?;
        Ok(results)
    }
}

/// Checks the precondition, invokes every vector and writes the results.
pub async fn execute(
    node: &NodeClient,
    wrapper: &WrapperAbi,
    address: Address,
    paths: &OutputPaths,
) -> Result<Vec<InvocationResult>> {
    let code_size = ensure_code(node, address).await?;
    info!(%address, code_size, "Wrapper code present");

    let mut results = Vec::new();
    let outcome = invoke_all(node, wrapper, address, &default_vectors(), &mut results).await;

    // Written even when the node drops out so the completed vectors survive.
    write_json(&paths.stage3_results(), &results)?;
    outcome?;

    info!(path = %paths.stage3_results().display(), "Stage 3 results saved");
    Ok(results)
}

/// Calls the wrapper once and compares the decoded word.
pub async fn invoke_wrapper(
    node: &NodeClient,
    wrapper: &WrapperAbi,
    address: Address,
    vector: &TestVector,
) -> Result<B256> {
    let calldata = wrapper.encode_call(vector.as_bytes())?;
    let output = node.call(address, calldata).await?;
    wrapper.decode_hash(&output)
}

/// Invokes every vector in order, appending to `results`. Reverts and
/// undecodable output are recorded against their vector and the loop moves
/// on; losing the node is recorded and aborts the stage.
pub async fn invoke_all(
    node: &NodeClient,
    wrapper: &WrapperAbi,
    address: Address,
    vectors: &[TestVector],
    results: &mut Vec<InvocationResult>,
) -> Result<()> {
    for vector in vectors {
        let expected = vector.reference_hash();
        match invoke_wrapper(node, wrapper, address, vector).await {
            Ok(returned) => {
                let result = InvocationResult::compared(vector, address, expected, returned);
                info!(input = %vector, matched = result.matched, "Wrapper call completed");
                results.push(result);
            }
            Err(ParityError::Node(err)) if err.is_connectivity() => {
                error!(input = %vector, error = %err, "Lost connection to node");
                results.push(InvocationResult::failed(
                    vector,
                    address,
                    expected,
                    err.to_string(),
                ));
                return Err(ParityError::Node(err));
            }
            Err(err) => {
                error!(input = %vector, error = %err, "Wrapper call failed");
                results.push(InvocationResult::failed(
                    vector,
                    address,
                    expected,
                    err.to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Prints the stage 3 outcome, either as status lines or as JSON.
pub fn display_results(
    results: &[InvocationResult],
    address: Address,
    json_output: bool,
) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    println!("\n{}", "Wrapper Call Results".bold().green());
    println!("{}", "====================".green());
    println!("Contract Address: {address}");

    for result in results {
        let label = TestVector::from(result.input.as_str()).label();
        if !result.wrapper_call_success {
            println!("{} Input: {label:?}", "❌".red());
            println!(
                "  Error: {}",
                result.error.as_deref().unwrap_or("unknown error").red()
            );
            continue;
        }
        let status = if result.matched { "✅" } else { "❌" };
        println!("{status} Input: {label:?}");
        println!("  Expected: {}", result.expected_hash);
        println!(
            "  Returned: {}",
            result.returned_hash.as_deref().unwrap_or("<none>")
        );
    }

    let mismatches = results.iter().filter(|r| !r.matched).count();
    if mismatches == 0 {
        println!("{}", "✅ All wrapper results match the reference hash".green());
    } else {
        println!(
            "{}",
            format!("❌ {mismatches} wrapper result(s) DO NOT match").red()
        );
    }
    Ok(())
}
