//! Runs all three stages in one process, handing the deployed address to the
//! wrapper stage directly instead of through the file system.

use alloy::primitives::Address;
use clap::Parser;
use colored::Colorize;
use parity_common::args::CliArgs;
use serde::Serialize;
use tracing::info;

use crate::{
    artifacts::{
        load_abi,
        load_bytecode,
    },
    config::{
        ArtifactArgs,
        DEFAULT_NETWORK_NAME,
        DeployerArgs,
        NodeArgs,
        parse_precompile_address,
    },
    deploy,
    error::Result,
    raw_invoke::{
        self,
        RawInvokeArgs,
        SHA256_PRECOMPILE,
    },
    results::{
        DeploymentRecord,
        InvocationResult,
        OutputPaths,
        RawInvocationReport,
        ensure_all_matched,
    },
    wrapper_invoke::{
        self,
        WrapperAbi,
    },
};

/// Everything produced by a full run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub raw: RawInvocationReport,
    pub deployment: DeploymentRecord,
    pub wrapper: Vec<InvocationResult>,
}

impl PipelineReport {
    pub fn raw_mismatches(&self) -> usize {
        self.raw.mismatches()
    }

    pub fn wrapper_mismatches(&self) -> usize {
        self.wrapper.iter().filter(|r| !r.matched).count()
    }

    /// Fails if either path produced a digest that differs from the reference.
    pub fn verdict(&self) -> Result<()> {
        ensure_all_matched("stage 1", self.raw_mismatches(), self.raw.results.len())?;
        ensure_all_matched("stage 3", self.wrapper_mismatches(), self.wrapper.len())
    }
}

/// Run the raw, deploy and wrapper stages back to back.
#[derive(Debug, Clone, Parser)]
#[clap(
    name = "all",
    about = "Run the raw, deploy and wrapper stages in sequence."
)]
pub struct PipelineArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    #[command(flatten)]
    pub deployer: DeployerArgs,

    /// Address of the precompile, short (`0x02`) or full form
    #[arg(long, default_value = "0x02", value_parser = parse_precompile_address)]
    pub precompile: Address,

    /// Network label recorded in the stage 1 report
    #[arg(long, env = "NETWORK_NAME", default_value = DEFAULT_NETWORK_NAME)]
    pub network: String,
}

impl Default for PipelineArgs {
    fn default() -> Self {
        Self {
            node: NodeArgs::default(),
            artifacts: ArtifactArgs::default(),
            deployer: DeployerArgs::default(),
            precompile: SHA256_PRECOMPILE,
            network: DEFAULT_NETWORK_NAME.to_string(),
        }
    }
}

impl PipelineArgs {
    fn raw_args(&self) -> RawInvokeArgs {
        RawInvokeArgs {
            node: self.node.clone(),
            precompile: self.precompile,
            network: self.network.clone(),
        }
    }

    /// Runs every stage, stopping at the first fatal error. Mismatches do not
    /// stop the run; they are reported once all files are written.
    pub async fn run(&self, cli_args: &CliArgs) -> Result<PipelineReport> {
        let signer = self.deployer.signer()?;
        let bytecode = load_bytecode(&self.artifacts.bytecode_path())?;
        let wrapper = WrapperAbi::from_json_abi(&load_abi(&self.artifacts.abi_path())?)?;

        let paths = OutputPaths::new(cli_args.work_dir());
        let raw_args = self.raw_args();
        let node = raw_args.connect(&paths).await?;

        info!("Running stage 1");
        let raw = raw_args.execute(&node, &paths).await?;

        info!("Running stage 2");
        let deployment =
            deploy::execute(&node, &signer, bytecode, self.deployer.options(), &paths).await?;

        info!(address = %deployment.contract_address, "Running stage 3");
        let wrapper =
            wrapper_invoke::execute(&node, &wrapper, deployment.contract_address, &paths).await?;

        let report = PipelineReport {
            raw,
            deployment,
            wrapper,
        };
        display_report(&report, &paths, cli_args.json_output())?;
        report.verdict()?;
        Ok(report)
    }
}

pub fn display_report(
    report: &PipelineReport,
    paths: &OutputPaths,
    json_output: bool,
) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    raw_invoke::display_report(&report.raw, false)?;
    deploy::display_record(&report.deployment, paths, false)?;
    wrapper_invoke::display_results(&report.wrapper, report.deployment.contract_address, false)?;

    println!("\n{}", "Summary".bold());
    let line = |name: &str, mismatches: usize, total: usize| {
        if mismatches == 0 {
            println!("{} {name}: {total}/{total} match", "✅".green());
        } else {
            println!(
                "{} {name}: {} of {total} mismatched",
                "❌".red(),
                mismatches
            );
        }
    };
    line("precompile", report.raw_mismatches(), report.raw.results.len());
    line("wrapper", report.wrapper_mismatches(), report.wrapper.len());
    Ok(())
}
