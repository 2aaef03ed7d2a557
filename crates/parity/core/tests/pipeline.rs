mod common;

use common::{
    TestHarness,
    read_json,
    unreachable_node,
};
use int_test_utils::WrapperFault;
use parity_core::{
    ParityError,
    pipeline::PipelineArgs,
    results::read_deployed_address,
};
use serde_json::json;

fn pipeline_args(harness: &TestHarness) -> PipelineArgs {
    PipelineArgs {
        node: harness.node_args(),
        artifacts: harness.artifact_args(),
        deployer: harness.deployer_args(),
        ..PipelineArgs::default()
    }
}

#[tokio::test]
async fn all_stages_agree_with_the_reference() {
    let harness = TestHarness::start().await;
    let report = pipeline_args(&harness)
        .run(&harness.cli_args())
        .await
        .unwrap();

    assert_eq!(report.raw_mismatches(), 0);
    assert_eq!(report.wrapper_mismatches(), 0);
    assert!(report.verdict().is_ok());

    let address = harness.deployer().create(0);
    assert_eq!(report.deployment.contract_address, address);
    assert!(report.wrapper.iter().all(|r| r.contract_address == address));

    let paths = harness.paths();
    assert_eq!(read_deployed_address(&paths.deployed_address()).unwrap(), address);
    assert_eq!(read_json(&paths.stage1_results())["results"][0]["match"], json!(true));
    assert_eq!(read_json(&paths.stage2_results())["verificationPass"], json!(true));
    assert_eq!(read_json(&paths.stage3_results())[0]["match"], json!(true));
}

#[tokio::test]
async fn wrapper_mismatch_fails_the_run_after_writing_everything() {
    let harness = TestHarness::start().await;
    harness
        .node
        .wrapper_fault(b"hello world", WrapperFault::WrongDigest);

    let err = pipeline_args(&harness)
        .run(&harness.cli_args())
        .await
        .unwrap_err();
    assert!(matches!(err, ParityError::Mismatch { stage: "stage 3", .. }));

    let paths = harness.paths();
    assert!(paths.stage1_results().exists());
    assert!(paths.stage2_results().exists());
    assert_eq!(read_json(&paths.stage3_results())[0]["match"], json!(false));
}

#[tokio::test]
async fn fatal_deployment_skips_the_wrapper_stage() {
    let harness = TestHarness::start().await;
    harness.node.revert_deployments();

    let err = pipeline_args(&harness)
        .run(&harness.cli_args())
        .await
        .unwrap_err();
    assert!(matches!(err, ParityError::DeploymentReverted { .. }));

    let paths = harness.paths();
    assert!(paths.stage1_results().exists());
    assert!(!paths.stage3_results().exists());
    assert_eq!(harness.node.request_count("eth_getCode"), 0);
}

#[tokio::test]
async fn precompile_mismatch_still_runs_the_later_stages() {
    let harness = TestHarness::start().await;
    harness.node.corrupt_precompile_output(b"");

    let err = pipeline_args(&harness)
        .run(&harness.cli_args())
        .await
        .unwrap_err();
    assert!(matches!(err, ParityError::Mismatch { stage: "stage 1", .. }));
    assert!(harness.paths().stage3_results().exists());
}

#[tokio::test]
async fn unreachable_node_still_leaves_a_stage_one_report() {
    let harness = TestHarness::start().await;
    let args = PipelineArgs {
        node: unreachable_node(),
        ..pipeline_args(&harness)
    };

    let err = args.run(&harness.cli_args()).await.unwrap_err();
    assert!(matches!(err, ParityError::Node(_)));

    let paths = harness.paths();
    let report = read_json(&paths.stage1_results());
    assert_eq!(report["success"], json!(false));
    assert!(report["error"].is_string());
    assert_eq!(report["results"], json!([]));
    assert!(!paths.stage2_results().exists());
    assert!(!paths.deployed_address().exists());
}
