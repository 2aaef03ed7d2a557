//! Stage 2: deploy the forwarding wrapper with a signed legacy transaction
//! and confirm it landed.
//!
//! The deployment is confirmed by polling for the receipt on a fixed interval.
//! The contract address is derived from the sender and nonce rather than
//! taken from the receipt, and code must be present at that address before
//! the address is handed to stage 3.

use std::time::Duration;

use alloy::{
    consensus::{
        SignableTransaction,
        Signed,
        TxEnvelope,
        TxLegacy,
    },
    eips::eip2718::Encodable2718,
    network::TxSignerSync,
    primitives::{
        Address,
        Bytes,
        TxHash,
        TxKind,
        U256,
    },
    rpc::types::TransactionReceipt,
    signers::local::PrivateKeySigner,
};
use clap::Parser;
use colored::Colorize;
use parity_common::args::CliArgs;
use tokio::time::{
    self,
    MissedTickBehavior,
};
use tracing::{
    debug,
    info,
    warn,
};

use crate::{
    artifacts::load_bytecode,
    config::{
        ArtifactArgs,
        DeployerArgs,
        NodeArgs,
    },
    error::{
        ParityError,
        Result,
    },
    node::{
        NodeClient,
        Submission,
    },
    results::{
        DeploymentRecord,
        OutputPaths,
        write_deployed_address,
        write_json,
    },
};

/// 1 gwei.
pub const DEFAULT_GAS_PRICE: u128 = 1_000_000_000;
pub const DEFAULT_GAS_LIMIT: u64 = 2_000_000;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(180);

/// Fixed transaction parameters and the confirmation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployOptions {
    pub gas_price: u128,
    pub gas_limit: u64,
    pub poll_interval: Duration,
    pub receipt_timeout: Duration,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            gas_price: DEFAULT_GAS_PRICE,
            gas_limit: DEFAULT_GAS_LIMIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }
}

/// Deploy the SHA-256 wrapper contract.
#[derive(Debug, Clone, Parser)]
#[clap(
    name = "deploy",
    about = "Deploy the SHA-256 wrapper contract and record its address."
)]
pub struct DeployArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    #[command(flatten)]
    pub deployer: DeployerArgs,
}

impl DeployArgs {
    pub async fn run(&self, cli_args: &CliArgs) -> Result<DeploymentRecord> {
        // Configuration problems surface before any network traffic.
        let signer = self.deployer.signer()?;
        let bytecode = load_bytecode(&self.artifacts.bytecode_path())?;
        info!(deployer = %signer.address(), size = bytecode.len(), "Loaded deployer and bytecode");

        let node = self.node.connect().await?;
        let paths = OutputPaths::new(cli_args.work_dir());
        let record = execute(&node, &signer, bytecode, self.deployer.options(), &paths).await?;

        display_record(&record, &paths, cli_args.json_output())?;
        Ok(record)
    }
}

/// Deploys, verifies and persists both the record and the hand-off address.
pub async fn execute(
    node: &NodeClient,
    signer: &PrivateKeySigner,
    bytecode: Bytes,
    options: DeployOptions,
    paths: &OutputPaths,
) -> Result<DeploymentRecord> {
    let mut record = deploy_wrapper(node, signer, bytecode, options).await?;
    verify_deployment(node, &mut record).await?;

    write_deployed_address(&paths.deployed_address(), record.contract_address)?;
    write_json(&paths.stage2_results(), &record)?;
    info!(
        address = %record.contract_address,
        path = %paths.stage2_results().display(),
        "Stage 2 results saved"
    );
    Ok(record)
}

/// Builds the unsigned contract creation transaction.
pub fn creation_transaction(
    chain_id: u64,
    nonce: u64,
    bytecode: Bytes,
    options: &DeployOptions,
) -> TxLegacy {
    TxLegacy {
        chain_id: Some(chain_id),
        nonce,
        gas_price: options.gas_price,
        gas_limit: options.gas_limit,
        to: TxKind::Create,
        value: U256::ZERO,
        input: bytecode,
    }
}

/// Signs with EIP-155 replay protection bound to the transaction's chain id.
pub fn sign_legacy(signer: &PrivateKeySigner, mut tx: TxLegacy) -> Result<Signed<TxLegacy>> {
    let signature = signer.sign_transaction_sync(&mut tx)?;
    Ok(tx.into_signed(signature))
}

/// Polls for the receipt until it appears or `timeout` elapses. Lookup
/// errors from a reachable node are retried on the next tick; losing the
/// node altogether is fatal.
pub async fn wait_for_receipt(
    node: &NodeClient,
    tx_hash: TxHash,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<TransactionReceipt> {
    let poll = async {
        let mut ticker = time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match node.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => debug!(%tx_hash, "Receipt not available yet"),
                Err(err) if err.is_connectivity() => return Err(ParityError::from(err)),
                Err(err) => warn!(%tx_hash, error = %err, "Receipt lookup failed, retrying"),
            }
        }
    };

    time::timeout(timeout, poll)
        .await
        .map_err(|_| ParityError::ReceiptTimeout { tx_hash, timeout })?
}

/// Signs and submits the creation transaction, then waits for it to be
/// mined. The returned record is not yet verified.
pub async fn deploy_wrapper(
    node: &NodeClient,
    signer: &PrivateKeySigner,
    bytecode: Bytes,
    options: DeployOptions,
) -> Result<DeploymentRecord> {
    let sender = signer.address();
    let chain_id = node.chain_id();
    let nonce = node.pending_nonce(sender).await?;
    info!(%sender, nonce, chain_id, "Preparing deployment transaction");

    let signed = sign_legacy(
        signer,
        creation_transaction(chain_id, nonce, bytecode, &options),
    )?;
    let tx_hash = *signed.hash();
    let encoded = TxEnvelope::Legacy(signed).encoded_2718();

    match node.send_raw_transaction(&encoded).await? {
        Submission::Accepted(hash) => {
            if hash != tx_hash {
                warn!(%hash, local = %tx_hash, "Node reported a different transaction hash");
            }
            info!(%tx_hash, "Deployment transaction submitted");
        }
        Submission::AlreadyKnown => {
            warn!(%tx_hash, "Transaction already known by node");
        }
    }

    info!(%tx_hash, "Waiting for transaction to be mined");
    let receipt = wait_for_receipt(
        node,
        tx_hash,
        options.poll_interval,
        options.receipt_timeout,
    )
    .await?;

    let block_number = receipt.block_number.unwrap_or_default();
    if !receipt.status() {
        return Err(ParityError::DeploymentReverted {
            tx_hash,
            block_number,
            gas_used: receipt.gas_used,
        });
    }
    info!(%tx_hash, block_number, gas_used = receipt.gas_used, "Transaction mined");

    let derived = sender.create(nonce);
    if let Some(reported) = receipt.contract_address {
        if reported != derived {
            return Err(ParityError::AddressMismatch { reported, derived });
        }
    }

    Ok(DeploymentRecord {
        block_number,
        transaction_hash: tx_hash,
        contract_address: derived,
        gas_used: receipt.gas_used,
        bytecode_size: 0,
        status: u64::from(receipt.status()),
        verification_pass: false,
    })
}

/// Checks that code exists at `address`, returning its size.
pub async fn ensure_code(node: &NodeClient, address: Address) -> Result<usize> {
    let code = node.code_at(address).await?;
    if code.is_empty() {
        return Err(ParityError::EmptyCode(address));
    }
    Ok(code.len())
}

/// Confirms the mined deployment left code behind and marks the record.
pub async fn verify_deployment(node: &NodeClient, record: &mut DeploymentRecord) -> Result<()> {
    if record.status != 1 {
        return Err(ParityError::DeploymentReverted {
            tx_hash: record.transaction_hash,
            block_number: record.block_number,
            gas_used: record.gas_used,
        });
    }

    record.bytecode_size = ensure_code(node, record.contract_address).await?;
    record.verification_pass = true;
    info!(
        address = %record.contract_address,
        code_size = record.bytecode_size,
        "Contract verification passed"
    );
    Ok(())
}

/// Prints the stage 2 outcome, either as status lines or as JSON.
pub fn display_record(
    record: &DeploymentRecord,
    paths: &OutputPaths,
    json_output: bool,
) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }

    println!("\n{}", "🚀 Deployment successful!".bold().green());
    println!("✅ Transaction {} mined in block {}", record.transaction_hash, record.block_number);
    println!("✅ Contract verification passed - Code size: {} bytes", record.bytecode_size);
    println!("📝 Results saved to {}", paths.stage2_results().display());
    println!(
        "📌 Contract Address: {}",
        record.contract_address.to_checksum(None).cyan().bold()
    );
    Ok(())
}
