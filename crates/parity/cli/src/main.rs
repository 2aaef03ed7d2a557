mod cli;

use crate::cli::{
    Cli,
    Commands,
};
use clap::Parser;
use color_eyre::{
    Result,
    eyre::Report,
};
use parity_core::config::load_dotenv;
use serde_json::json;
use tracing_subscriber::{
    EnvFilter,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Builds the log filter after `load_env` runs, so `RUST_LOG` may come
/// from `.env`.
fn log_filter(load_env: impl FnOnce()) -> EnvFilter {
    load_env();
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::config::HookBuilder::default()
        .display_location_section(false)
        .display_env_section(false)
        .install()?;

    // Logs go to stderr so stdout stays clean for `--json`.
    tracing_subscriber::registry()
        .with(log_filter(load_dotenv))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = async {
        match &cli.command {
            Commands::Raw(raw) => {
                raw.run(&cli.args).await?;
            }
            Commands::Deploy(deploy) => {
                deploy.run(&cli.args).await?;
            }
            Commands::Wrapper(wrapper) => {
                wrapper.run(&cli.args).await?;
            }
            Commands::All(pipeline) => {
                pipeline.run(&cli.args).await?;
            }
        }
        Ok::<_, Report>(())
    }
    .await;

    if let Err(err) = result {
        if cli.args.json_output() {
            eprintln!(
                "{}",
                json!({
                    "status": "error",
                    "error": {
                        "message": err.to_string(),
                    }
                })
            );
            std::process::exit(1);
        } else {
            return Err(err);
        }
    }

    Ok(())
}
