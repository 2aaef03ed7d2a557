//! Stage 1: call the SHA-256 precompile directly and compare every output
//! with the locally computed digest.

use alloy::primitives::{
    Address,
    Bytes,
    address,
};
use chrono::{
    SecondsFormat,
    Utc,
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
    warn,
};

use crate::{
    config::{
        DEFAULT_NETWORK_NAME,
        NodeArgs,
        parse_precompile_address,
    },
    error::{
        ParityError,
        Result,
    },
    node::NodeClient,
    results::{
        OutputPaths,
        RawInvocationReport,
        RawInvocationResult,
        ensure_all_matched,
        write_json,
    },
};

pub const STAGE_NAME: &str = "Stage 1 - Raw Precompile Invocation";

/// Reserved address of the SHA-256 precompile.
pub const SHA256_PRECOMPILE: Address = address!("0000000000000000000000000000000000000002");

/// Call the precompile directly with each test input.
#[derive(Debug, Clone, Parser)]
#[clap(
    name = "raw",
    about = "Call the SHA-256 precompile directly and compare against local digests."
)]
pub struct RawInvokeArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    /// Address of the precompile, short (`0x02`) or full form
    #[arg(long, default_value = "0x02", value_parser = parse_precompile_address)]
    pub precompile: Address,

    /// Network label recorded in the report
    #[arg(long, env = "NETWORK_NAME", default_value = DEFAULT_NETWORK_NAME)]
    pub network: String,
}

impl Default for RawInvokeArgs {
    fn default() -> Self {
        Self {
            node: NodeArgs::default(),
            precompile: SHA256_PRECOMPILE,
            network: DEFAULT_NETWORK_NAME.to_string(),
        }
    }
}

impl RawInvokeArgs {
    fn empty_report(&self) -> RawInvocationReport {
        RawInvocationReport {
            stage: STAGE_NAME.to_string(),
            precompile: self.precompile,
            network: self.network.clone(),
            rpc_url: self.node.rpc_url(),
            chain_id: None,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            success: false,
            error: None,
            results: Vec::new(),
        }
    }

    /// Connects to the node. A failed connection is still recorded as a
    /// stage 1 report before the error is returned.
    pub async fn connect(&self, paths: &OutputPaths) -> Result<NodeClient> {
        match self.node.connect().await {
            Ok(node) => Ok(node),
            Err(err) => {
                let mut report = self.empty_report();
                report.error = Some(err.to_string());
                write_json(&paths.stage1_results(), &report)?;
                Err(err)
            }
        }
    }

    /// Runs the stage end to end: connect, invoke, persist, print.
    pub async fn run(&self, cli_args: &CliArgs) -> Result<RawInvocationReport> {
        let paths = OutputPaths::new(cli_args.work_dir());
        let node = self.connect(&paths).await?;

        let report = self.execute(&node, &paths).await?;
        display_report(&report, cli_args.json_output())?;
        ensure_all_matched("stage 1", report.mismatches(), report.results.len())?;
        Ok(report)
    }

    /// Invokes every vector against an already connected node and writes the
    /// report. The report is written even when the stage aborts so the
    /// failing input and its error are on disk for inspection.
    pub async fn execute(
        &self,
        node: &NodeClient,
        paths: &OutputPaths,
    ) -> Result<RawInvocationReport> {
        let mut report = self.empty_report();
        let outcome = invoke_all(node, self.precompile, &default_vectors(), &mut report).await;

        if let Err(err) = &outcome {
            error!(error = %err, "Raw precompile stage aborted");
            report.error = Some(err.to_string());
        }
        write_json(&paths.stage1_results(), &report)?;
        outcome?;

        info!(
            path = %paths.stage1_results().display(),
            mismatches = report.mismatches(),
            "Stage 1 results saved"
        );
        Ok(report)
    }
}

/// Calls the precompile once and compares the raw return bytes.
pub async fn invoke_precompile(
    node: &NodeClient,
    precompile: Address,
    vector: &TestVector,
) -> Result<RawInvocationResult> {
    let expected = vector.reference_hash();
    let returned = node
        .call(precompile, Bytes::copy_from_slice(vector.as_bytes()))
        .await
        .map_err(|source| {
            ParityError::PrecompileCall {
                precompile,
                input: vector.text(),
                source,
            }
        })?;

    if returned.len() != 32 {
        warn!(
            input = %vector,
            len = returned.len(),
            "Precompile returned an unexpected number of bytes"
        );
    }

    Ok(RawInvocationResult::compared(vector, expected, &returned))
}

/// Invokes the precompile for every vector, filling `report` as it goes.
/// Stops at the first call error, which is recorded against its vector.
pub async fn invoke_all(
    node: &NodeClient,
    precompile: Address,
    vectors: &[TestVector],
    report: &mut RawInvocationReport,
) -> Result<()> {
    report.chain_id = Some(node.chain_id());

    for vector in vectors {
        match invoke_precompile(node, precompile, vector).await {
            Ok(result) => {
                info!(
                    input = %vector,
                    matched = result.matched,
                    "Precompile call completed"
                );
                report.results.push(result);
            }
            Err(err) => {
                report.results.push(RawInvocationResult::failed(
                    vector,
                    vector.reference_hash(),
                    err.to_string(),
                ));
                return Err(err);
            }
        }
    }

    report.success = true;
    Ok(())
}

/// Prints the stage 1 outcome, either as status lines or as JSON.
pub fn display_report(report: &RawInvocationReport, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("\n{}", "Precompile Call Results".bold().green());
    println!("{}", "=======================".green());
    println!("RPC Endpoint: {}", report.rpc_url);
    println!("Precompile Address: {}", report.precompile);
    if let Some(chain_id) = report.chain_id {
        println!("Chain ID: {chain_id}");
    }

    for result in &report.results {
        let status = if result.matched { "✅" } else { "❌" };
        let label = TestVector::from(result.input.as_str()).label();
        println!("{status} Input: {label:?}");
        println!("  Expected: {}", result.expected_hash);
        println!(
            "  Returned: {}",
            result.returned_hash.as_deref().unwrap_or("<none>")
        );
    }

    let mismatches = report.mismatches();
    if mismatches == 0 {
        println!("{}", "✅ All precompile results match the reference hash".green());
    } else {
        println!(
            "{}",
            format!("❌ {mismatches} precompile result(s) DO NOT match").red()
        );
    }
    Ok(())
}
