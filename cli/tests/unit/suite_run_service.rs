//! Unit tests for `run_suite` against in-memory fakes.

#![allow(clippy::expect_used)]

use serde_json::json;
use stackcheck_cli::application::services::suite_run::{
    Cancellation, RunContext, RunOptions, run_suite,
};
use stackcheck_cli::domain::{PlanError, ResourceKind, SuiteConfig};
use stackcheck_common::{Cause, ModuleStatus, RunReport};

use crate::mocks::{FakeProvisioner, FakeReader, MemoryLedger, RecordingReporter, vpc_attrs};

const RUN_ID: &str = "run-00000000000000aa";

const VPC_MODULE: &str = r"
modules:
  - id: vpc
    dir: /work/eu-west-1/vpc
    vars:
      environment: test
    outputs:
      - name: vpc_id
        kind: scalar
        expect: [not_empty]
      - name: private_subnets
        kind: sequence
        expect: [{length: 3}]
      - name: public_subnets
        kind: sequence
        expect: [{length: 3}]
    resources:
      - kind: vpc
        id_from: vpc_id
        expect:
          - attribute: tags.Environment
            checks: [{equals: test}]
";

const CHAIN: &str = r"
modules:
  - id: vpc
    dir: /work/vpc
  - id: rds
    dir: /work/rds
    requires: [vpc]
  - id: ecs
    dir: /work/ecs
    requires: [rds]
";

fn suite(yaml: &str) -> SuiteConfig {
    let suite: SuiteConfig = serde_yaml::from_str(yaml).expect("valid suite yaml");
    suite.validate().expect("valid suite");
    suite
}

fn vpc_provisioner() -> FakeProvisioner {
    FakeProvisioner::new()
        .with_output("vpc", "vpc_id", json!("vpc-123"))
        .with_output("vpc", "private_subnets", json!(["s-1", "s-2", "s-3"]))
        .with_output("vpc", "public_subnets", json!(["s-4", "s-5", "s-6"]))
}

fn opts() -> RunOptions {
    RunOptions {
        run_id: RUN_ID.to_string(),
        only: Vec::new(),
        parallel: false,
    }
}

async fn run(
    provisioner: &FakeProvisioner,
    reader: &FakeReader,
    ledger: &MemoryLedger,
    suite: &SuiteConfig,
    opts: &RunOptions,
) -> Result<RunReport, PlanError> {
    let reporter = RecordingReporter::new();
    let cancel = Cancellation::new();
    let ctx = RunContext {
        provisioner,
        reader,
        ledger,
        reporter: &reporter,
        cancel: &cancel,
    };
    run_suite(&ctx, suite, opts).await
}

fn status_of(report: &RunReport, module: &str) -> ModuleStatus {
    report
        .modules
        .iter()
        .find(|m| m.module == module)
        .map(|m| m.status)
        .expect("module reported")
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_vpc_module_passes_every_check() {
    let provisioner = vpc_provisioner();
    let reader = FakeReader::new().with_resource(ResourceKind::Vpc, vpc_attrs("vpc-123", "test"));
    let ledger = MemoryLedger::new();

    let report = run(&provisioner, &reader, &ledger, &suite(VPC_MODULE), &opts())
        .await
        .expect("valid plan");

    assert!(report.passed(), "report: {report:?}");
    let vpc = &report.modules[0];
    assert_eq!(vpc.status, ModuleStatus::Passed);
    assert_eq!(vpc.assertions.len(), 4);
    assert!(vpc.assertions.iter().all(|a| a.passed));
    assert_eq!(report.destroyed, vec!["vpc"]);
    assert_eq!(provisioner.destroyed(), vec!["vpc"]);
}

#[tokio::test]
async fn test_live_check_uses_suite_region() {
    let provisioner = vpc_provisioner();
    let reader = FakeReader::new().with_resource(ResourceKind::Vpc, vpc_attrs("vpc-123", "test"));
    let ledger = MemoryLedger::new();
    let mut suite = suite(VPC_MODULE);
    suite.settings.region = "eu-west-1".to_string();

    run(&provisioner, &reader, &ledger, &suite, &opts())
        .await
        .expect("valid plan");

    let calls = reader.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0.id, "vpc-123");
    assert_eq!(calls[0].1.region, "eu-west-1");
}

// ── Assertion failures ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_tag_mismatch_fails_with_explanation() {
    let provisioner = vpc_provisioner();
    let reader = FakeReader::new().with_resource(ResourceKind::Vpc, vpc_attrs("vpc-123", "prod"));
    let ledger = MemoryLedger::new();

    let report = run(&provisioner, &reader, &ledger, &suite(VPC_MODULE), &opts())
        .await
        .expect("valid plan");

    let vpc = &report.modules[0];
    assert_eq!(vpc.status, ModuleStatus::Failed);
    assert_eq!(vpc.cause, Some(Cause::AssertionFailed));
    let failing: Vec<_> = vpc.assertions.iter().filter(|a| !a.passed).collect();
    assert_eq!(failing.len(), 1);
    assert!(failing[0].explanation.contains("test"));
    assert!(failing[0].explanation.contains("prod"));
    // Output checks still ran and passed.
    assert_eq!(vpc.assertions.iter().filter(|a| a.passed).count(), 3);
    // A failed module is still torn down.
    assert_eq!(provisioner.destroyed(), vec!["vpc"]);
}

#[tokio::test]
async fn test_output_of_wrong_kind_is_type_mismatch() {
    let provisioner = vpc_provisioner().with_output("vpc", "private_subnets", json!("s-1,s-2,s-3"));
    let reader = FakeReader::new().with_resource(ResourceKind::Vpc, vpc_attrs("vpc-123", "test"));
    let ledger = MemoryLedger::new();

    let report = run(&provisioner, &reader, &ledger, &suite(VPC_MODULE), &opts())
        .await
        .expect("valid plan");

    let vpc = &report.modules[0];
    assert_eq!(vpc.status, ModuleStatus::Failed);
    assert_eq!(vpc.cause, Some(Cause::OutputTypeMismatch));
    assert!(
        vpc.message
            .as_deref()
            .is_some_and(|m| m.contains("private_subnets"))
    );
}

#[tokio::test]
async fn test_missing_output_is_reported() {
    let provisioner = FakeProvisioner::new()
        .with_output("vpc", "vpc_id", json!("vpc-123"))
        .with_output("vpc", "private_subnets", json!(["a", "b", "c"]));
    let reader = FakeReader::new().with_resource(ResourceKind::Vpc, vpc_attrs("vpc-123", "test"));
    let ledger = MemoryLedger::new();

    let report = run(&provisioner, &reader, &ledger, &suite(VPC_MODULE), &opts())
        .await
        .expect("valid plan");

    let vpc = &report.modules[0];
    assert_eq!(vpc.cause, Some(Cause::OutputMissing));
    assert!(
        vpc.message
            .as_deref()
            .is_some_and(|m| m.contains("public_subnets"))
    );
}

#[tokio::test]
async fn test_absent_live_resource_fails_module() {
    let provisioner = vpc_provisioner();
    let reader = FakeReader::new();
    let ledger = MemoryLedger::new();

    let report = run(&provisioner, &reader, &ledger, &suite(VPC_MODULE), &opts())
        .await
        .expect("valid plan");

    let vpc = &report.modules[0];
    assert_eq!(vpc.status, ModuleStatus::Failed);
    let failing: Vec<_> = vpc.assertions.iter().filter(|a| !a.passed).collect();
    assert_eq!(failing.len(), 1);
    assert!(failing[0].explanation.contains("not found"));
}

#[tokio::test]
async fn test_validation_panic_is_contained() {
    let provisioner = vpc_provisioner();
    let reader = FakeReader::new().panicking_on("vpc-123");
    let ledger = MemoryLedger::new();

    let report = run(&provisioner, &reader, &ledger, &suite(VPC_MODULE), &opts())
        .await
        .expect("valid plan");

    let vpc = &report.modules[0];
    assert_eq!(vpc.status, ModuleStatus::Failed);
    assert_eq!(vpc.cause, Some(Cause::ValidationPanicked));
    assert_eq!(provisioner.destroyed(), vec!["vpc"]);
}

#[tokio::test]
async fn test_apply_panic_still_tears_down_applied_modules() {
    let provisioner = FakeProvisioner::new().panicking_apply("rds");
    let reader = FakeReader::new();
    let ledger = MemoryLedger::new();

    let report = run(&provisioner, &reader, &ledger, &suite(CHAIN), &opts())
        .await
        .expect("valid plan");

    assert!(!report.passed());
    assert_eq!(status_of(&report, "vpc"), ModuleStatus::Passed);
    let rds = &report.modules[1];
    assert_eq!(rds.status, ModuleStatus::Failed);
    assert_eq!(rds.cause, Some(Cause::ProvisionError));
    assert!(
        rds.message
            .as_deref()
            .is_some_and(|m| m.contains("provider plugin crashed"))
    );
    assert_eq!(rds.applied_at, None);
    assert_eq!(status_of(&report, "ecs"), ModuleStatus::Skipped);

    assert_eq!(provisioner.calls(), vec!["apply vpc", "apply rds", "destroy vpc"]);
    assert_eq!(report.destroyed, vec!["vpc"]);
    assert!(ledger.is_empty());
}

// ── Sequencing and teardown ──────────────────────────────────────────────────

#[tokio::test]
async fn test_teardown_runs_in_reverse_apply_order() {
    let provisioner = FakeProvisioner::new();
    let reader = FakeReader::new();
    let ledger = MemoryLedger::new();

    let report = run(&provisioner, &reader, &ledger, &suite(CHAIN), &opts())
        .await
        .expect("valid plan");

    assert!(report.passed());
    assert_eq!(provisioner.applied(), vec!["vpc", "rds", "ecs"]);
    assert_eq!(provisioner.destroyed(), vec!["ecs", "rds", "vpc"]);
    assert_eq!(report.destroyed, vec!["ecs", "rds", "vpc"]);
}

#[tokio::test]
async fn test_failed_apply_skips_dependents_and_destroys_applied() {
    let provisioner = FakeProvisioner::new().failing_apply("rds");
    let reader = FakeReader::new();
    let ledger = MemoryLedger::new();

    let report = run(&provisioner, &reader, &ledger, &suite(CHAIN), &opts())
        .await
        .expect("valid plan");

    assert!(!report.passed());
    assert_eq!(status_of(&report, "vpc"), ModuleStatus::Passed);
    let rds = &report.modules[1];
    assert_eq!(rds.status, ModuleStatus::Failed);
    assert_eq!(rds.cause, Some(Cause::ProvisionError));
    let ecs = &report.modules[2];
    assert_eq!(ecs.status, ModuleStatus::Skipped);
    assert_eq!(ecs.cause, Some(Cause::UnmetDependency));
    assert_eq!(
        ecs.message.as_deref(),
        Some("skipped: unmet dependency: rds")
    );

    assert_eq!(provisioner.applied(), vec!["vpc", "rds"]);
    assert_eq!(provisioner.destroyed(), vec!["vpc"]);
}

#[tokio::test(start_paused = true)]
async fn test_apply_timeout_is_reported_and_not_destroyed() {
    let provisioner = FakeProvisioner::new().hanging_apply("rds");
    let reader = FakeReader::new();
    let ledger = MemoryLedger::new();
    let mut suite = suite(CHAIN);
    suite.settings.timeouts.apply_secs = 30;

    let report = run(&provisioner, &reader, &ledger, &suite, &opts())
        .await
        .expect("valid plan");

    let rds = &report.modules[1];
    assert_eq!(rds.cause, Some(Cause::ProvisionTimeout));
    assert!(rds.message.as_deref().is_some_and(|m| m.contains("30s")));
    assert_eq!(status_of(&report, "ecs"), ModuleStatus::Skipped);
    assert_eq!(provisioner.destroyed(), vec!["vpc"]);
}

#[tokio::test]
async fn test_only_selection_skips_module_with_unselected_prerequisite() {
    let provisioner = FakeProvisioner::new();
    let reader = FakeReader::new();
    let ledger = MemoryLedger::new();
    let opts = RunOptions {
        only: vec!["rds".to_string()],
        ..opts()
    };

    let report = run(&provisioner, &reader, &ledger, &suite(CHAIN), &opts)
        .await
        .expect("valid plan");

    assert_eq!(report.modules.len(), 1);
    assert_eq!(report.modules[0].status, ModuleStatus::Skipped);
    assert!(provisioner.calls().is_empty());
    assert!(report.passed());
}

#[tokio::test]
async fn test_skipped_module_adds_no_assertions_and_run_still_passes() {
    let provisioner = vpc_provisioner();
    let reader = FakeReader::new().with_resource(ResourceKind::Vpc, vpc_attrs("vpc-123", "test"));
    let ledger = MemoryLedger::new();
    let suite = suite(&format!(
        "{VPC_MODULE}  - id: bastion
    dir: /work/bastion
  - id: cache
    dir: /work/cache
    requires: [bastion]
"
    ));
    let opts = RunOptions {
        only: vec!["vpc".to_string(), "cache".to_string()],
        ..opts()
    };

    let report = run(&provisioner, &reader, &ledger, &suite, &opts)
        .await
        .expect("valid plan");

    assert!(report.passed(), "report: {report:?}");
    assert_eq!(status_of(&report, "vpc"), ModuleStatus::Passed);
    let cache = &report.modules[1];
    assert_eq!(cache.status, ModuleStatus::Skipped);
    assert_eq!(cache.cause, Some(Cause::UnmetDependency));
    assert!(cache.assertions.is_empty());
    assert_eq!(provisioner.applied(), vec!["vpc"]);
}

#[tokio::test]
async fn test_cycle_is_rejected_before_any_apply() {
    let provisioner = FakeProvisioner::new();
    let reader = FakeReader::new();
    let ledger = MemoryLedger::new();
    let suite = suite(
        r"
modules:
  - id: a
    dir: /work/a
    requires: [b]
  - id: b
    dir: /work/b
    requires: [a]
",
    );

    let err = run(&provisioner, &reader, &ledger, &suite, &opts())
        .await
        .expect_err("cycle must be rejected");

    assert!(matches!(err, PlanError::DependencyCycle { .. }));
    assert!(provisioner.calls().is_empty());
    assert!(ledger.saves().is_empty());
}

#[tokio::test]
async fn test_outputs_are_wired_into_dependent_inputs() {
    let provisioner = FakeProvisioner::new().with_output("vpc", "vpc_id", json!("vpc-123"));
    let reader = FakeReader::new();
    let ledger = MemoryLedger::new();
    let suite = suite(
        r"
modules:
  - id: vpc
    dir: /work/vpc
  - id: rds
    dir: /work/rds
    requires: [vpc]
    vars:
      engine: postgres
      vpc_id: placeholder
    inputs_from:
      vpc_id: {module: vpc, output: vpc_id}
",
    );

    let report = run(&provisioner, &reader, &ledger, &suite, &opts())
        .await
        .expect("valid plan");

    assert!(report.passed());
    let vars = provisioner.vars_for("rds").expect("rds applied");
    assert_eq!(vars.get("vpc_id"), Some(&json!("vpc-123")));
    assert_eq!(vars.get("engine"), Some(&json!("postgres")));
}

#[tokio::test]
async fn test_unavailable_input_fails_dependent_without_apply() {
    let provisioner = FakeProvisioner::new();
    let reader = FakeReader::new();
    let ledger = MemoryLedger::new();
    let suite = suite(
        r"
modules:
  - id: vpc
    dir: /work/vpc
  - id: rds
    dir: /work/rds
    requires: [vpc]
    inputs_from:
      vpc_id: {module: vpc, output: vpc_id}
",
    );

    let report = run(&provisioner, &reader, &ledger, &suite, &opts())
        .await
        .expect("valid plan");

    let rds = &report.modules[1];
    assert_eq!(rds.status, ModuleStatus::Failed);
    assert_eq!(rds.cause, Some(Cause::OutputMissing));
    assert_eq!(provisioner.applied(), vec!["vpc"]);
}

#[tokio::test]
async fn test_destroy_failure_is_recorded_and_teardown_continues() {
    let provisioner = FakeProvisioner::new().failing_destroy("rds");
    let reader = FakeReader::new();
    let ledger = MemoryLedger::new();

    let report = run(&provisioner, &reader, &ledger, &suite(CHAIN), &opts())
        .await
        .expect("valid plan");

    assert!(!report.passed());
    assert_eq!(provisioner.destroyed(), vec!["ecs", "rds", "vpc"]);
    assert_eq!(report.destroyed, vec!["ecs", "vpc"]);
    assert_eq!(report.teardown_failures.len(), 1);
    assert_eq!(report.teardown_failures[0].module, "rds");

    // The module that survived stays in the ledger for `stackcheck cleanup`.
    let left = ledger.get(RUN_ID).expect("ledger kept");
    let ids: Vec<&str> = left.applied.iter().map(|m| m.id()).collect();
    assert_eq!(ids, vec!["rds"]);
}

#[tokio::test]
async fn test_ledger_tracks_applied_modules_and_is_removed_after_teardown() {
    let provisioner = FakeProvisioner::new();
    let reader = FakeReader::new();
    let ledger = MemoryLedger::new();

    run(&provisioner, &reader, &ledger, &suite(CHAIN), &opts())
        .await
        .expect("valid plan");

    let saves = ledger.saves();
    let max_applied = saves.iter().map(|l| l.applied.len()).max();
    assert_eq!(max_applied, Some(3));
    assert!(saves.iter().all(|l| l.run_id == RUN_ID));
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn test_cancellation_stops_new_applies_but_tears_down() {
    let cancel = Cancellation::new();
    let provisioner = FakeProvisioner::new().cancel_after_apply("vpc", &cancel);
    let reader = FakeReader::new();
    let ledger = MemoryLedger::new();
    let reporter = RecordingReporter::new();
    let ctx = RunContext {
        provisioner: &provisioner,
        reader: &reader,
        ledger: &ledger,
        reporter: &reporter,
        cancel: &cancel,
    };

    let report = run_suite(&ctx, &suite(CHAIN), &opts())
        .await
        .expect("valid plan");

    assert!(!report.passed());
    assert_eq!(status_of(&report, "vpc"), ModuleStatus::Passed);
    assert_eq!(status_of(&report, "rds"), ModuleStatus::Cancelled);
    assert_eq!(status_of(&report, "ecs"), ModuleStatus::Cancelled);
    assert_eq!(provisioner.applied(), vec!["vpc"]);
    assert_eq!(provisioner.destroyed(), vec!["vpc"]);
}

#[tokio::test]
async fn test_parallel_wave_applies_independent_modules() {
    let provisioner = FakeProvisioner::new();
    let reader = FakeReader::new();
    let ledger = MemoryLedger::new();
    let suite = suite(
        r"
modules:
  - id: vpc-a
    dir: /work/a
  - id: vpc-b
    dir: /work/b
  - id: peering
    dir: /work/peering
    requires: [vpc-a, vpc-b]
",
    );
    let opts = RunOptions {
        parallel: true,
        ..opts()
    };

    let report = run(&provisioner, &reader, &ledger, &suite, &opts)
        .await
        .expect("valid plan");

    assert!(report.passed());
    let applied = provisioner.applied();
    assert_eq!(applied.len(), 3);
    assert_eq!(applied[2], "peering");
    let reversed: Vec<String> = applied.iter().rev().cloned().collect();
    assert_eq!(provisioner.destroyed(), reversed);
    assert_eq!(report.destroyed, reversed);
}

#[tokio::test]
async fn test_reports_follow_declaration_order() {
    let provisioner = FakeProvisioner::new();
    let reader = FakeReader::new();
    let ledger = MemoryLedger::new();
    let suite = suite(
        r"
modules:
  - id: ecs
    dir: /work/ecs
    requires: [vpc]
  - id: vpc
    dir: /work/vpc
",
    );

    let report = run(&provisioner, &reader, &ledger, &suite, &opts())
        .await
        .expect("valid plan");

    let order: Vec<&str> = report.modules.iter().map(|m| m.module.as_str()).collect();
    assert_eq!(order, vec!["ecs", "vpc"]);
    assert_eq!(provisioner.applied(), vec!["vpc", "ecs"]);
}
