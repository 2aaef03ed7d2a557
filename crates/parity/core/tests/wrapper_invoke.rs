mod common;

use alloy::primitives::{
    Address,
    Bytes,
};
use common::{
    TestHarness,
    read_json,
};
use int_test_utils::WrapperFault;
use parity_core::{
    ParityError,
    artifacts::ArtifactError,
    config::NodeArgs,
    results::write_deployed_address,
    wrapper_invoke::WrapperArgs,
};
use serde_json::{
    Value,
    json,
};
use wiremock::{
    Mock,
    MockServer,
    Request,
    ResponseTemplate,
    matchers::{
        body_partial_json,
        method,
    },
};

const WRAPPER: Address = Address::repeat_byte(0x42);

fn wrapper_args(harness: &TestHarness) -> WrapperArgs {
    WrapperArgs {
        node: harness.node_args(),
        artifacts: harness.artifact_args(),
        address: None,
    }
}

async fn with_wrapper() -> TestHarness {
    let harness = TestHarness::start().await;
    harness
        .node
        .set_code(WRAPPER, Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]));
    write_deployed_address(&harness.paths().deployed_address(), WRAPPER).unwrap();
    harness
}

#[tokio::test]
async fn wrapper_results_match_the_reference() {
    let harness = with_wrapper().await;
    let results = wrapper_args(&harness)
        .run(&harness.cli_args())
        .await
        .unwrap();

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.matched && r.wrapper_call_success));
    assert!(results.iter().all(|r| r.contract_address == WRAPPER));

    let written = read_json(&harness.paths().stage3_results());
    let entries = written.as_array().unwrap();
    let inputs: Vec<_> = entries.iter().map(|e| e["input"].clone()).collect();
    assert_eq!(
        inputs,
        vec![
            json!("hello world"),
            json!(""),
            json!("The quick brown fox jumps over the lazy dog"),
            json!("cdk-erigon"),
        ]
    );
    assert_eq!(
        entries[1]["returnedHash"],
        json!("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
    );
}

#[tokio::test]
async fn failing_vectors_do_not_stop_later_ones() {
    let harness = with_wrapper().await;
    harness.node.wrapper_fault(b"hello world", WrapperFault::Revert);
    harness.node.wrapper_fault(b"", WrapperFault::ShortOutput);

    let err = wrapper_args(&harness)
        .run(&harness.cli_args())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ParityError::Mismatch {
            stage: "stage 3",
            mismatched: 2,
            total: 4
        }
    ));

    let written = read_json(&harness.paths().stage3_results());
    let entries = written.as_array().unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0]["wrapperCallSuccess"], json!(false));
    assert_eq!(entries[0]["returnedHash"], json!(null));
    assert!(entries[0]["error"].is_string());
    assert_eq!(entries[1]["wrapperCallSuccess"], json!(false));
    assert_eq!(entries[2]["match"], json!(true));
    assert_eq!(entries[3]["match"], json!(true));
}

#[tokio::test]
async fn wrong_digest_is_a_mismatch_not_a_failure() {
    let harness = with_wrapper().await;
    harness
        .node
        .wrapper_fault(b"cdk-erigon", WrapperFault::WrongDigest);

    let err = wrapper_args(&harness)
        .run(&harness.cli_args())
        .await
        .unwrap_err();
    assert!(matches!(err, ParityError::Mismatch { mismatched: 1, .. }));

    let written = read_json(&harness.paths().stage3_results());
    assert_eq!(written[3]["wrapperCallSuccess"], json!(true));
    assert_eq!(written[3]["match"], json!(false));
}

#[tokio::test]
async fn address_without_code_fails_before_any_call() {
    let harness = TestHarness::start().await;
    write_deployed_address(&harness.paths().deployed_address(), WRAPPER).unwrap();

    let err = wrapper_args(&harness)
        .run(&harness.cli_args())
        .await
        .unwrap_err();
    assert!(matches!(err, ParityError::EmptyCode(address) if address == WRAPPER));
    assert_eq!(harness.node.request_count("eth_call"), 0);
    assert!(!harness.paths().stage3_results().exists());
}

#[tokio::test]
async fn missing_hand_off_file_is_a_configuration_error() {
    let harness = TestHarness::start().await;
    let err = wrapper_args(&harness)
        .run(&harness.cli_args())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ParityError::Artifact(ArtifactError::Read { .. })
    ));
    assert_eq!(harness.node.request_count("eth_chainId"), 0);
}

#[tokio::test]
async fn explicit_address_overrides_the_hand_off_file() {
    let harness = TestHarness::start().await;
    harness
        .node
        .set_code(WRAPPER, Bytes::from_static(&[0x60, 0x80]));

    let mut args = wrapper_args(&harness);
    args.address = Some(WRAPPER);
    let results = args.run(&harness.cli_args()).await.unwrap();
    assert_eq!(results.len(), 4);
}

/// Answers with `body` merged into an envelope echoing the request id.
fn reply(body: Value) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync {
    move |request: &Request| {
        let id = serde_json::from_slice::<Value>(&request.body)
            .ok()
            .and_then(|req| req.get("id").cloned())
            .unwrap_or(json!(0));
        let mut envelope = json!({ "jsonrpc": "2.0", "id": id });
        if let (Some(envelope), Some(body)) = (envelope.as_object_mut(), body.as_object()) {
            envelope.extend(body.clone());
        }
        ResponseTemplate::new(200).set_body_json(envelope)
    }
}

/// A node that has the wrapper's code but stops serving once calls begin.
async fn node_dropping_calls() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_chainId" })))
        .respond_with(reply(json!({ "result": "0x2775" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_getCode" })))
        .respond_with(reply(json!({ "result": "0x60806040" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_call" })))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    server
}

async fn calls_received(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|request| serde_json::from_slice::<Value>(&request.body).ok())
        .filter(|body| body["method"] == json!("eth_call"))
        .count()
}

#[tokio::test]
async fn losing_the_node_aborts_after_the_first_call() {
    let harness = TestHarness::start().await;
    let server = node_dropping_calls().await;

    let args = WrapperArgs {
        node: NodeArgs {
            rpc_host: "127.0.0.1".to_string(),
            rpc_port: server.address().port(),
            rpc_timeout_seconds: 5,
            expected_chain_id: None,
        },
        artifacts: harness.artifact_args(),
        address: Some(WRAPPER),
    };
    let err = args.run(&harness.cli_args()).await.unwrap_err();
    assert!(
        matches!(&err, ParityError::Node(node) if node.is_connectivity()),
        "unexpected error: {err}"
    );
    assert_eq!(calls_received(&server).await, 1);

    let written = read_json(&harness.paths().stage3_results());
    let entries = written.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["input"], json!("hello world"));
    assert_eq!(entries[0]["wrapperCallSuccess"], json!(false));
    assert!(entries[0]["error"].is_string());
}
