use clap::Parser;
use parity_common::args::CliArgs;
use parity_core::{
    deploy::DeployArgs,
    pipeline::PipelineArgs,
    raw_invoke::RawInvokeArgs,
    wrapper_invoke::WrapperArgs,
};

#[derive(Parser)]
#[command(
    name = "precompile-parity",
    version,
    about = "Checks that the SHA-256 precompile answers the same whether called directly or from a contract"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    #[command(flatten)]
    pub args: CliArgs,
}

#[derive(clap::Subcommand)]
#[allow(clippy::large_enum_variant)]
pub enum Commands {
    #[command(name = "raw")]
    Raw(RawInvokeArgs),
    #[command(name = "deploy")]
    Deploy(DeployArgs),
    #[command(name = "wrapper")]
    Wrapper(WrapperArgs),
    #[command(name = "all")]
    All(PipelineArgs),
}
