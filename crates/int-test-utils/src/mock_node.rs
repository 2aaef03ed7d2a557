use alloy::{
    consensus::{
        Transaction,
        TxEnvelope,
        transaction::SignerRecoverable,
    },
    eips::eip2718::Decodable2718,
    hex,
    primitives::{
        Address,
        B256,
        Bytes,
        TxHash,
        keccak256,
    },
    sol_types::SolValue,
};
use axum::{
    Json,
    Router,
    extract::State,
    response::{
        IntoResponse,
        Response,
    },
    routing::post,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{
    Value,
    json,
};
use sha2::{
    Digest,
    Sha256,
};
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::{
        Arc,
        atomic::{
            AtomicBool,
            AtomicU64,
            Ordering,
        },
    },
};
use tokio::net::TcpListener;
use tracing::debug;

/// Address the node treats as the SHA-256 precompile.
pub const SHA256_PRECOMPILE: Address = Address::with_last_byte(2);

/// Function signature the wrapper model answers to.
pub const WRAPPER_SIGNATURE: &str = "sha256Hash(bytes)";

const EXECUTION_REVERTED: i64 = 3;
const SERVER_ERROR: i64 = -32000;
const GAS_USED: u64 = 0x1_d4c0;

/// How a wrapper call for a given input misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperFault {
    /// The call reverts.
    Revert,
    /// The call succeeds but returns fewer than 32 bytes.
    ShortOutput,
    /// The call returns a word that is not the SHA-256 of the input.
    WrongDigest,
}

#[derive(Debug, Default)]
struct Faults {
    precompile_errors: HashSet<Vec<u8>>,
    corrupt_precompile: HashSet<Vec<u8>>,
    wrapper: HashMap<Vec<u8>, WrapperFault>,
}

#[derive(Debug, Clone)]
struct MinedTx {
    receipt: Value,
    polls_until_visible: u64,
}

#[derive(Debug)]
struct NodeState {
    chain_id: u64,
    block_number: AtomicU64,
    nonces: DashMap<Address, u64>,
    code: DashMap<Address, Bytes>,
    transactions: DashMap<TxHash, MinedTx>,
    requests: DashMap<String, u64>,
    receipt_delay: AtomicU64,
    revert_deployments: AtomicBool,
    drop_code: AtomicBool,
    ack_as_known: AtomicBool,
    faults: Mutex<Faults>,
}

/// In-process JSON-RPC execution node with just enough state to accept a
/// contract deployment and answer calls to the SHA-256 precompile and to a
/// forwarding wrapper.
///
/// Any contract deployed through `eth_sendRawTransaction` behaves like the
/// wrapper: `sha256Hash(bytes)` returns the digest of its argument.
#[derive(Debug, Clone)]
pub struct MockNode {
    state: Arc<NodeState>,
    port: u16,
}

impl MockNode {
    /// Starts the node on an ephemeral local port.
    pub async fn start(chain_id: u64) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let state = Arc::new(NodeState {
            chain_id,
            block_number: AtomicU64::new(0),
            nonces: DashMap::new(),
            code: DashMap::new(),
            transactions: DashMap::new(),
            requests: DashMap::new(),
            receipt_delay: AtomicU64::new(0),
            revert_deployments: AtomicBool::new(false),
            drop_code: AtomicBool::new(false),
            ack_as_known: AtomicBool::new(false),
            faults: Mutex::new(Faults::default()),
        });

        let server = Self { state, port };
        server.start_http_server(listener);
        Ok(server)
    }

    pub fn http_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn host(&self) -> &'static str {
        "127.0.0.1"
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn chain_id(&self) -> u64 {
        self.state.chain_id
    }

    /// Number of requests received for `method`.
    pub fn request_count(&self, method: &str) -> u64 {
        self.state.requests.get(method).map_or(0, |count| *count)
    }

    pub fn nonce(&self, address: Address) -> u64 {
        self.state.nonces.get(&address).map_or(0, |nonce| *nonce)
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.state.nonces.insert(address, nonce);
    }

    pub fn code_at(&self, address: Address) -> Option<Bytes> {
        self.state.code.get(&address).map(|code| code.clone())
    }

    /// Installs code at `address`, which then behaves like a deployed wrapper.
    pub fn set_code(&self, address: Address, code: Bytes) {
        self.state.code.insert(address, code);
    }

    /// Receipts only become visible after this many lookups.
    pub fn delay_receipts(&self, polls: u64) {
        self.state.receipt_delay.store(polls, Ordering::Release);
    }

    /// Deployments are mined with a failed status and leave no code.
    pub fn revert_deployments(&self) {
        self.state.revert_deployments.store(true, Ordering::Release);
    }

    /// Deployments succeed but leave no code behind.
    pub fn drop_deployed_code(&self) {
        self.state.drop_code.store(true, Ordering::Release);
    }

    /// Every submission is accepted into the chain but acknowledged with an
    /// `already known` error, as a node that saw an earlier copy would.
    pub fn acknowledge_as_known(&self) {
        self.state.ack_as_known.store(true, Ordering::Release);
    }

    pub fn fail_precompile_call(&self, input: &[u8]) {
        self.state.faults.lock().precompile_errors.insert(input.to_vec());
    }

    pub fn corrupt_precompile_output(&self, input: &[u8]) {
        self.state.faults.lock().corrupt_precompile.insert(input.to_vec());
    }

    pub fn wrapper_fault(&self, input: &[u8], fault: WrapperFault) {
        self.state.faults.lock().wrapper.insert(input.to_vec(), fault);
    }

    fn start_http_server(&self, listener: TcpListener) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let app = Router::new()
                .route("/", post(handle_http_request))
                .with_state(state);
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("HTTP server error: {e}");
            }
        });
    }
}

async fn handle_http_request(
    State(state): State<Arc<NodeState>>,
    Json(request): Json<Value>,
) -> Response {
    let response = match request {
        Value::Array(batch) => {
            Value::Array(batch.iter().map(|req| generate_response(req, &state)).collect())
        }
        single => generate_response(&single, &state),
    };
    Json(response).into_response()
}

type RpcResult = Result<Value, (i64, String)>;

fn generate_response(request: &Value, state: &NodeState) -> Value {
    let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
    let id = request.get("id").cloned().unwrap_or(json!(1));
    let params = request
        .get("params")
        .and_then(|p| p.as_array())
        .cloned()
        .unwrap_or_default();

    *state.requests.entry(method.to_string()).or_insert(0) += 1;
    debug!(method, "Mock node request");

    let result = match method {
        "eth_chainId" => Ok(json!(format!("0x{:x}", state.chain_id))),
        "eth_blockNumber" => {
            Ok(json!(format!(
                "0x{:x}",
                state.block_number.load(Ordering::Acquire)
            )))
        }
        "eth_getTransactionCount" => {
            param_address(&params, 0).map(|address| {
                let nonce = state.nonces.get(&address).map_or(0, |n| *n);
                json!(format!("0x{nonce:x}"))
            })
        }
        "eth_getCode" => {
            param_address(&params, 0).map(|address| {
                let code = state.code.get(&address).map(|c| c.clone()).unwrap_or_default();
                json!(code)
            })
        }
        "eth_sendRawTransaction" => send_raw_transaction(state, &params),
        "eth_getTransactionReceipt" => transaction_receipt(state, &params),
        "eth_call" => call(state, &params),
        _ => Err((-32601, format!("method {method} not supported"))),
    };

    match result {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err((code, message)) => {
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": code, "message": message }
            })
        }
    }
}

fn invalid_params(message: impl Into<String>) -> (i64, String) {
    (-32602, message.into())
}

fn param_address(params: &[Value], index: usize) -> Result<Address, (i64, String)> {
    params
        .get(index)
        .and_then(|p| p.as_str())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid_params("expected an address"))
}

fn param_bytes(value: Option<&Value>) -> Result<Vec<u8>, (i64, String)> {
    value
        .and_then(|v| v.as_str())
        .and_then(|s| hex::decode(s).ok())
        .ok_or_else(|| invalid_params("expected hex data"))
}

fn send_raw_transaction(state: &NodeState, params: &[Value]) -> RpcResult {
    let raw = param_bytes(params.first())?;
    let tx_hash = keccak256(&raw);

    if state.transactions.contains_key(&tx_hash) {
        return Err((SERVER_ERROR, "already known".to_string()));
    }

    let envelope = TxEnvelope::decode_2718(&mut raw.as_slice())
        .map_err(|e| invalid_params(format!("rlp: {e}")))?;
    if let Some(chain_id) = envelope.chain_id() {
        if chain_id != state.chain_id {
            return Err((SERVER_ERROR, format!("invalid chain id {chain_id}")));
        }
    }
    let sender = envelope
        .recover_signer()
        .map_err(|e| invalid_params(format!("invalid sender: {e}")))?;

    let expected_nonce = state.nonces.get(&sender).map_or(0, |n| *n);
    if envelope.nonce() < expected_nonce {
        return Err((SERVER_ERROR, "nonce too low".to_string()));
    }
    state.nonces.insert(sender, envelope.nonce() + 1);

    let block_number = state.block_number.fetch_add(1, Ordering::AcqRel) + 1;
    let reverted = state.revert_deployments.load(Ordering::Acquire);
    let contract_address = envelope.kind().is_create().then(|| sender.create(envelope.nonce()));

    if let Some(address) = contract_address {
        if !reverted && !state.drop_code.load(Ordering::Acquire) {
            state.code.insert(address, envelope.input().clone());
        }
    }

    let receipt = json!({
        "transactionHash": tx_hash,
        "transactionIndex": "0x0",
        "blockHash": keccak256(block_number.to_be_bytes()),
        "blockNumber": format!("0x{block_number:x}"),
        "from": sender,
        "to": envelope.to(),
        "cumulativeGasUsed": format!("0x{GAS_USED:x}"),
        "gasUsed": format!("0x{GAS_USED:x}"),
        "effectiveGasPrice": "0x3b9aca00",
        "contractAddress": contract_address,
        "logs": [],
        "logsBloom": format!("0x{}", "0".repeat(512)),
        "type": "0x0",
        "status": if reverted { "0x0" } else { "0x1" },
    });
    state.transactions.insert(
        tx_hash,
        MinedTx {
            receipt,
            polls_until_visible: state.receipt_delay.load(Ordering::Acquire),
        },
    );

    if state.ack_as_known.load(Ordering::Acquire) {
        return Err((SERVER_ERROR, "already known".to_string()));
    }
    Ok(json!(tx_hash))
}

fn transaction_receipt(state: &NodeState, params: &[Value]) -> RpcResult {
    let tx_hash: TxHash = params
        .first()
        .and_then(|p| p.as_str())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid_params("expected a transaction hash"))?;

    let Some(mut mined) = state.transactions.get_mut(&tx_hash) else {
        return Ok(Value::Null);
    };
    if mined.polls_until_visible > 0 {
        mined.polls_until_visible -= 1;
        return Ok(Value::Null);
    }
    Ok(mined.receipt.clone())
}

fn call(state: &NodeState, params: &[Value]) -> RpcResult {
    let request = params
        .first()
        .ok_or_else(|| invalid_params("missing call object"))?;
    let to = request
        .get("to")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<Address>().ok())
        .ok_or_else(|| invalid_params("missing call target"))?;
    let data = match request.get("input").or_else(|| request.get("data")) {
        Some(value) => param_bytes(Some(value))?,
        None => Vec::new(),
    };

    if to == SHA256_PRECOMPILE {
        return precompile_call(state, &data);
    }
    if state.code.get(&to).is_some_and(|code| !code.is_empty()) {
        return wrapper_call(state, &data);
    }
    // Calls to accounts without code succeed with empty output.
    Ok(json!(Bytes::new()))
}

fn sha256(data: &[u8]) -> B256 {
    B256::from(<[u8; 32]>::from(Sha256::digest(data)))
}

fn precompile_call(state: &NodeState, data: &[u8]) -> RpcResult {
    let faults = state.faults.lock();
    if faults.precompile_errors.contains(data) {
        return Err((SERVER_ERROR, "precompile failure".to_string()));
    }
    let mut digest = sha256(data);
    if faults.corrupt_precompile.contains(data) {
        digest.0[0] ^= 0xff;
    }
    Ok(json!(digest))
}

fn wrapper_call(state: &NodeState, data: &[u8]) -> RpcResult {
    let selector = &keccak256(WRAPPER_SIGNATURE)[..4];
    if data.len() < 4 || &data[..4] != selector {
        return Err((EXECUTION_REVERTED, "execution reverted".to_string()));
    }
    let input = Bytes::abi_decode(&data[4..])
        .map_err(|_| (EXECUTION_REVERTED, "execution reverted".to_string()))?;

    let fault = state.faults.lock().wrapper.get(input.as_ref()).copied();
    let digest = sha256(&input);
    match fault {
        None => Ok(json!(digest)),
        Some(WrapperFault::Revert) => {
            Err((EXECUTION_REVERTED, "execution reverted".to_string()))
        }
        Some(WrapperFault::ShortOutput) => Ok(json!(Bytes::copy_from_slice(&digest[..16]))),
        Some(WrapperFault::WrongDigest) => Ok(json!(sha256(digest.as_slice()))),
    }
}
