mod common;

use common::{
    TestHarness,
    read_json,
    unreachable_node,
};
use parity_core::{
    ParityError,
    raw_invoke::RawInvokeArgs,
};
use serde_json::json;

fn raw_args(harness: &TestHarness) -> RawInvokeArgs {
    RawInvokeArgs {
        node: harness.node_args(),
        ..RawInvokeArgs::default()
    }
}

#[tokio::test]
async fn every_vector_matches_the_reference() {
    let harness = TestHarness::start().await;
    let report = raw_args(&harness).run(&harness.cli_args()).await.unwrap();

    assert!(report.success);
    assert_eq!(report.chain_id, Some(common::CHAIN_ID));
    assert_eq!(report.results.len(), 4);
    assert_eq!(report.mismatches(), 0);

    let written = read_json(&harness.paths().stage1_results());
    assert_eq!(written["network"], json!("cdk-erigon"));
    assert_eq!(written["results"][0]["input"], json!("hello world"));
    assert_eq!(
        written["results"][0]["expectedHash"],
        json!("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
    );
    assert_eq!(written["results"][0]["match"], json!(true));
    assert_eq!(written["results"][1]["input"], json!(""));
    assert_eq!(
        written["results"][1]["returnedHash"],
        json!("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
    );
}

#[tokio::test]
async fn mismatch_is_persisted_then_reported() {
    let harness = TestHarness::start().await;
    harness.node.corrupt_precompile_output(b"hello world");

    let err = raw_args(&harness).run(&harness.cli_args()).await.unwrap_err();
    assert!(matches!(
        err,
        ParityError::Mismatch {
            stage: "stage 1",
            mismatched: 1,
            total: 4
        }
    ));

    let written = read_json(&harness.paths().stage1_results());
    assert_eq!(written["success"], json!(true));
    assert_eq!(written["results"][0]["match"], json!(false));
    assert_eq!(written["results"][1]["match"], json!(true));
}

#[tokio::test]
async fn call_error_aborts_but_keeps_the_partial_report() {
    let harness = TestHarness::start().await;
    harness.node.fail_precompile_call(b"");

    let err = raw_args(&harness).run(&harness.cli_args()).await.unwrap_err();
    assert!(matches!(err, ParityError::PrecompileCall { .. }));

    let written = read_json(&harness.paths().stage1_results());
    assert_eq!(written["success"], json!(false));
    assert!(written["error"].as_str().unwrap().contains("precompile failure"));
    let results = written["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1]["success"], json!(false));
    assert_eq!(results[1]["returnedHash"], json!(null));
}

#[tokio::test]
async fn unreachable_node_is_fatal_and_recorded() {
    let harness = TestHarness::start().await;
    let args = RawInvokeArgs {
        node: unreachable_node(),
        ..RawInvokeArgs::default()
    };

    let err = args.run(&harness.cli_args()).await.unwrap_err();
    match err {
        ParityError::Node(node_err) => assert!(node_err.is_connectivity()),
        other => panic!("unexpected error: {other}"),
    }

    let written = read_json(&harness.paths().stage1_results());
    assert_eq!(written["success"], json!(false));
    assert_eq!(written["chainId"], json!(null));
    assert!(written["error"].is_string());
}

#[tokio::test]
async fn expected_chain_id_must_agree_with_the_node() {
    let harness = TestHarness::start().await;
    let mut args = raw_args(&harness);
    args.node.expected_chain_id = Some(1);

    let err = args.run(&harness.cli_args()).await.unwrap_err();
    assert!(matches!(
        err,
        ParityError::ChainIdMismatch {
            node: common::CHAIN_ID,
            expected: 1
        }
    ));
    assert_eq!(harness.node.request_count("eth_call"), 0);
}
