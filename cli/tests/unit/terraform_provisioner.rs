//! Unit tests for `TerraformProvisioner` argument construction, retry and
//! output parsing, driven through a scripted `CommandRunner`.

#![allow(clippy::expect_used)]

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use stackcheck_cli::application::ports::Provisioner;
use stackcheck_cli::domain::{
    AppliedModule, ModuleDescriptor, OutputError, ProvisionError, RetryPolicy, Variables,
};
use stackcheck_cli::infra::terraform::{
    TerraformProvisioner, is_already_gone, parse_output, var_args,
};

use crate::mocks::{ScriptedRunner, err_output, ok_output};

const TIMEOUT: Duration = Duration::from_secs(600);

fn module(dir: PathBuf) -> ModuleDescriptor {
    ModuleDescriptor {
        id: "vpc".to_string(),
        dir,
        vars: Variables::new(),
        requires: Vec::new(),
        inputs_from: Default::default(),
        outputs: Vec::new(),
        resources: Vec::new(),
    }
}

fn policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_retries,
        Duration::from_secs(5),
        Duration::from_secs(60),
        &[],
    )
    .expect("default patterns compile")
}

fn vars() -> Variables {
    Variables::from([
        ("environment".to_string(), json!("test")),
        ("azs".to_string(), json!(["a", "b"])),
    ])
}

// ── Argument construction ────────────────────────────────────────────────────

#[tokio::test]
async fn test_apply_runs_init_then_apply_with_vars() {
    let runner = ScriptedRunner::new(Vec::new());
    let provisioner =
        TerraformProvisioner::new(runner.clone(), "terraform", RetryPolicy::none(), TIMEOUT);

    let applied = provisioner
        .apply(&module(PathBuf::from("/work/vpc")), &vars())
        .await
        .expect("apply succeeds");

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "terraform");
    assert_eq!(
        calls[0].1,
        vec!["-chdir=/work/vpc", "init", "-no-color", "-input=false"]
    );
    assert_eq!(
        calls[1].1,
        vec![
            "-chdir=/work/vpc",
            "apply",
            "-no-color",
            "-auto-approve",
            "-input=false",
            "-var",
            r#"azs=["a","b"]"#,
            "-var",
            "environment=test",
        ]
    );
    assert_eq!(applied.handle.vars, vars());
    assert_eq!(applied.handle.dir, PathBuf::from("/work/vpc"));
}

#[tokio::test]
async fn test_terragrunt_uses_working_dir_flag() {
    let runner = ScriptedRunner::new(Vec::new());
    let provisioner = TerraformProvisioner::new(
        runner.clone(),
        "/usr/local/bin/terragrunt",
        RetryPolicy::none(),
        TIMEOUT,
    );

    provisioner
        .apply(&module(PathBuf::from("/work/vpc")), &Variables::new())
        .await
        .expect("apply succeeds");

    let calls = runner.calls();
    assert_eq!(
        calls[0].1,
        vec!["init", "--working-dir", "/work/vpc", "-no-color", "-input=false"]
    );
}

#[test]
fn test_var_args_pass_strings_raw_and_others_as_json() {
    let vars = Variables::from([
        ("count".to_string(), json!(3)),
        ("name".to_string(), json!("main")),
        ("tags".to_string(), json!({"Environment": "test"})),
    ]);
    assert_eq!(
        var_args(&vars),
        vec![
            "-var",
            "count=3",
            "-var",
            "name=main",
            "-var",
            r#"tags={"Environment":"test"}"#,
        ]
    );
}

// ── Failure handling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_apply_failure_carries_engine_error() {
    let runner = ScriptedRunner::new(vec![
        ok_output(b""),
        err_output(b"Refreshing state...\nError: creating EC2 VPC: InvalidParameterValue\n"),
    ]);
    let provisioner = TerraformProvisioner::new(runner.clone(), "terraform", policy(3), TIMEOUT);

    let err = provisioner
        .apply(&module(PathBuf::from("/work/vpc")), &Variables::new())
        .await
        .expect_err("apply fails");

    let ProvisionError::Failed { module, message } = err else {
        panic!("expected Failed, got {err:?}");
    };
    assert_eq!(module, "vpc");
    assert!(message.starts_with("Error: creating EC2 VPC"));
    // Not retryable: init plus exactly one apply attempt.
    assert_eq!(runner.subcommands(), vec!["init", "apply"]);
}

#[tokio::test(start_paused = true)]
async fn test_transient_error_is_retried_with_backoff() {
    let runner = ScriptedRunner::new(vec![
        ok_output(b""),
        err_output(b"Error: RequestLimitExceeded: Request limit exceeded."),
        err_output(b"Error: RequestLimitExceeded: Request limit exceeded."),
        ok_output(b""),
    ]);
    let provisioner = TerraformProvisioner::new(runner.clone(), "terraform", policy(3), TIMEOUT);

    let started = tokio::time::Instant::now();
    provisioner
        .apply(&module(PathBuf::from("/work/vpc")), &Variables::new())
        .await
        .expect("third apply attempt succeeds");

    assert_eq!(runner.subcommands(), vec!["init", "apply", "apply", "apply"]);
    // 5s then 10s of backoff.
    assert!(started.elapsed() >= Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn test_retries_stop_at_max() {
    let throttled = || err_output(b"Error: Throttling: Rate exceeded");
    let runner = ScriptedRunner::new(vec![
        ok_output(b""),
        throttled(),
        throttled(),
        throttled(),
    ]);
    let provisioner = TerraformProvisioner::new(runner.clone(), "terraform", policy(2), TIMEOUT);

    let err = provisioner
        .apply(&module(PathBuf::from("/work/vpc")), &Variables::new())
        .await
        .expect_err("retries exhausted");

    assert!(err.to_string().contains("Rate exceeded"));
    assert_eq!(runner.subcommands(), vec!["init", "apply", "apply", "apply"]);
}

// ── Destroy ──────────────────────────────────────────────────────────────────

fn applied_in(dir: PathBuf) -> AppliedModule {
    let descriptor = module(dir.clone());
    AppliedModule {
        descriptor,
        handle: stackcheck_cli::domain::ProvisionHandle {
            dir,
            vars: Variables::from([("environment".to_string(), json!("test"))]),
        },
        applied_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn test_destroy_reuses_apply_vars() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = ScriptedRunner::new(Vec::new());
    let provisioner =
        TerraformProvisioner::new(runner.clone(), "terraform", RetryPolicy::none(), TIMEOUT);

    provisioner
        .destroy(&applied_in(dir.path().to_path_buf()))
        .await
        .expect("destroy succeeds");

    let args = &runner.calls()[0].1;
    assert_eq!(args[1], "destroy");
    assert!(args.contains(&"-auto-approve".to_string()));
    assert!(args.contains(&"environment=test".to_string()));
}

#[tokio::test]
async fn test_destroy_of_already_gone_resources_succeeds() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = ScriptedRunner::new(vec![err_output(
        b"Error: deleting EC2 VPC (vpc-123): InvalidVpcID.NotFound",
    )]);
    let provisioner =
        TerraformProvisioner::new(runner.clone(), "terraform", RetryPolicy::none(), TIMEOUT);

    provisioner
        .destroy(&applied_in(dir.path().to_path_buf()))
        .await
        .expect("already gone counts as destroyed");
}

#[tokio::test]
async fn test_destroy_of_missing_dir_fails_without_running_engine() {
    let runner = ScriptedRunner::new(Vec::new());
    let provisioner =
        TerraformProvisioner::new(runner.clone(), "terraform", RetryPolicy::none(), TIMEOUT);

    let err = provisioner
        .destroy(&applied_in(PathBuf::from("/nonexistent/stackcheck/vpc")))
        .await
        .expect_err("a vanished dir cannot prove the resources are gone");
    assert!(err.to_string().contains("is gone, cannot destroy"));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_destroy_backend_error_mentioning_missing_bucket_is_a_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = ScriptedRunner::new(vec![err_output(
        b"Error: Failed to get existing workspaces: S3 bucket \"tf-state-prod\" does not exist.",
    )]);
    let provisioner =
        TerraformProvisioner::new(runner.clone(), "terraform", RetryPolicy::none(), TIMEOUT);

    let err = provisioner
        .destroy(&applied_in(dir.path().to_path_buf()))
        .await
        .expect_err("backend errors are not an already-gone destroy");
    assert!(err.to_string().contains("tf-state-prod"));
}

#[tokio::test]
async fn test_destroy_failure_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = ScriptedRunner::new(vec![err_output(
        b"Error: deleting EC2 VPC: DependencyViolation: has dependencies",
    )]);
    let provisioner =
        TerraformProvisioner::new(runner.clone(), "terraform", RetryPolicy::none(), TIMEOUT);

    let err = provisioner
        .destroy(&applied_in(dir.path().to_path_buf()))
        .await
        .expect_err("destroy fails");
    assert!(err.to_string().contains("DependencyViolation"));
}

#[test]
fn test_already_gone_markers() {
    assert!(is_already_gone(
        "Error: deleting RDS DB Instance (app-db): DBInstanceNotFound: app-db not found"
    ));
    assert!(is_already_gone("No state file was found!"));
    assert!(!is_already_gone("Error: DependencyViolation"));
    assert!(!is_already_gone(
        "Error: Failed to get existing workspaces: S3 bucket \"tf-state-prod\" does not exist."
    ));
    assert!(!is_already_gone(
        "Error: reading EC2 VPC (vpc-123): InvalidVpcID.NotFound"
    ));
    assert!(!is_already_gone(
        "Error: deleting EC2 VPC (vpc-1): InvalidVpcID.NotFound\n\
         Error: deleting EC2 Subnet (subnet-2): DependencyViolation"
    ));
}

// ── Outputs ──────────────────────────────────────────────────────────────────

const OUTPUT_JSON: &str = r#"{
    "vpc_id": {"sensitive": false, "type": "string", "value": "vpc-123"},
    "private_subnets": {"sensitive": false, "type": ["list", "string"], "value": ["s-1", "s-2"]}
}"#;

#[tokio::test]
async fn test_output_reads_value_from_output_json() {
    let runner = ScriptedRunner::new(vec![ok_output(OUTPUT_JSON.as_bytes())]);
    let provisioner =
        TerraformProvisioner::new(runner.clone(), "terraform", RetryPolicy::none(), TIMEOUT);

    let value = provisioner
        .output(&applied_in(PathBuf::from("/work/vpc")), "private_subnets")
        .await
        .expect("output present");

    assert_eq!(value, json!(["s-1", "s-2"]));
    assert_eq!(
        runner.calls()[0].1,
        vec!["-chdir=/work/vpc", "output", "-no-color", "-json"]
    );
}

#[test]
fn test_parse_output_missing_name() {
    let err = parse_output("vpc", OUTPUT_JSON, "db_endpoint").expect_err("absent");
    assert_eq!(
        err,
        OutputError::Missing {
            module: "vpc".to_string(),
            name: "db_endpoint".to_string(),
        }
    );
}

#[test]
fn test_parse_output_rejects_garbage() {
    let err = parse_output("vpc", "not json", "vpc_id").expect_err("invalid");
    assert!(matches!(err, OutputError::Unavailable { .. }));
}
