//! Thin JSON-RPC client for the execution node under test.

use std::time::Duration;

use alloy::{
    primitives::{
        Address,
        Bytes,
        TxHash,
    },
    providers::{
        Provider,
        ProviderBuilder,
        RootProvider,
    },
    rpc::types::{
        TransactionInput,
        TransactionReceipt,
        TransactionRequest,
    },
    transports::{
        RpcError,
        TransportError,
    },
};
use thiserror::Error;
use tracing::{
    debug,
    info,
};

/// Substring geth-derived nodes use when a transaction is already in the pool.
const ALREADY_KNOWN: &str = "already known";

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("failed to connect to node at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: TransportError,
    },
    #[error("node at {url} did not answer within {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("{method} against {url} failed: {source}")]
    Rpc {
        method: &'static str,
        url: String,
        #[source]
        source: TransportError,
    },
}

impl NodeError {
    /// True when the failure happened below JSON-RPC, i.e. the node could not
    /// be reached at all.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } => true,
            Self::Rpc { source, .. } => matches!(source, RpcError::Transport(_)),
        }
    }
}

/// Result of handing a signed transaction to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted(TxHash),
    /// The node already holds this exact transaction.
    AlreadyKnown,
}

fn is_already_known(err: &TransportError) -> bool {
    err.as_error_resp()
        .is_some_and(|payload| payload.message.contains(ALREADY_KNOWN))
}

/// Connection to a single execution node. The chain id is read once at
/// connect time and doubles as the reachability check.
#[derive(Debug, Clone)]
pub struct NodeClient {
    provider: RootProvider,
    url: String,
    chain_id: u64,
}

impl NodeClient {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, NodeError> {
        let provider = ProviderBuilder::new().connect(url).await.map_err(|source| {
            NodeError::Connect {
                url: url.to_string(),
                source,
            }
        })?;
        let provider = provider.root().clone();

        let chain_id = tokio::time::timeout(timeout, provider.get_chain_id())
            .await
            .map_err(|_| {
                NodeError::Timeout {
                    url: url.to_string(),
                    timeout,
                }
            })?
            .map_err(|source| {
                NodeError::Connect {
                    url: url.to_string(),
                    source,
                }
            })?;

        info!(url, chain_id, "Connected to execution node");

        Ok(Self {
            provider,
            url: url.to_string(),
            chain_id,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Chain id as reported by the node.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn rpc_error(&self, method: &'static str) -> impl FnOnce(TransportError) -> NodeError + '_ {
        move |source| {
            NodeError::Rpc {
                method,
                url: self.url.clone(),
                source,
            }
        }
    }

    /// Read-only `eth_call`. The calldata is sent under both `input` and
    /// `data` since older nodes only read the latter.
    pub async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, NodeError> {
        let request = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::both(calldata));
        let output = self
            .provider
            .call(request)
            .await
            .map_err(self.rpc_error("eth_call"))?;
        debug!(%to, output_len = output.len(), "eth_call returned");
        Ok(output)
    }

    pub async fn code_at(&self, address: Address) -> Result<Bytes, NodeError> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(self.rpc_error("eth_getCode"))
    }

    /// Nonce including transactions still in the pool.
    pub async fn pending_nonce(&self, address: Address) -> Result<u64, NodeError> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(self.rpc_error("eth_getTransactionCount"))
    }

    pub async fn send_raw_transaction(&self, encoded: &[u8]) -> Result<Submission, NodeError> {
        match self.provider.send_raw_transaction(encoded).await {
            Ok(pending) => Ok(Submission::Accepted(*pending.tx_hash())),
            Err(err) if is_already_known(&err) => Ok(Submission::AlreadyKnown),
            Err(err) => Err(self.rpc_error("eth_sendRawTransaction")(err)),
        }
    }

    pub async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, NodeError> {
        self.provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(self.rpc_error("eth_getTransactionReceipt"))
    }
}
