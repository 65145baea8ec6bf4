//! Application service — run a whole suite.
//!
//! Plan, then apply and validate wave by wave, then tear everything down.
//! Teardown always runs once the plan succeeded, whatever happened to the
//! individual modules.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::join_all;
use stackcheck_common::{Cause, ModuleReport, ModuleStatus, RunReport};

use crate::application::ports::{LedgerStore, ProgressReporter, Provisioner, ResourceStateReader};
use crate::application::services::extract::raw_output;
use crate::application::services::teardown::{RunState, teardown};
use crate::application::services::validate::validate_module;
use crate::domain::{
    ModuleDescriptor, PlanError, ProvisionError, RunLedger, Scope, SuiteConfig, Variables, plan,
};

/// Per-invocation options for `run_suite`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub run_id: String,
    /// Restrict the run to these module ids; empty runs everything.
    pub only: Vec<String>,
    /// Overrides `settings.parallel` when set.
    pub parallel: bool,
}

/// Shared cancellation flag. Once set, no new module is started; modules
/// already applying run to completion and teardown still runs.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Injected collaborators for a run.
pub struct RunContext<'a, P, S, L, R> {
    pub provisioner: &'a P,
    pub reader: &'a S,
    pub ledger: &'a L,
    pub reporter: &'a R,
    pub cancel: &'a Cancellation,
}

/// Run `suite`: plan, provision, validate, tear down.
///
/// # Errors
///
/// Returns `PlanError` if the suite is structurally invalid; in that case no
/// module has been applied.
pub async fn run_suite<P, S, L, R>(
    ctx: &RunContext<'_, P, S, L, R>,
    suite: &SuiteConfig,
    opts: &RunOptions,
) -> Result<RunReport, PlanError>
where
    P: Provisioner,
    S: ResourceStateReader,
    L: LedgerStore,
    R: ProgressReporter,
{
    let plan = plan(&suite.modules, &opts.only)?;
    let started_at = Utc::now();
    tracing::info!(
        run_id = %opts.run_id,
        waves = plan.waves.len(),
        skipped = plan.skipped.len(),
        "run planned"
    );

    let state = RunState::new(
        ctx.ledger,
        RunLedger::new(opts.run_id.clone(), suite.settings.binary.clone(), started_at),
    );
    let descriptors: HashMap<&str, &ModuleDescriptor> =
        suite.modules.iter().map(|m| (m.id.as_str(), m)).collect();
    let scope = suite.scope();
    let parallel = opts.parallel || suite.settings.parallel;

    let mut reports: HashMap<String, ModuleReport> = HashMap::new();
    for skip in &plan.skipped {
        ctx.reporter.warn(&format!(
            "{}: skipped: unmet dependency: {}",
            skip.module,
            skip.missing.join(", ")
        ));
        reports.insert(
            skip.module.clone(),
            ModuleReport::skipped_unmet(&skip.module, &skip.missing),
        );
    }

    for wave in &plan.waves {
        let applied: HashSet<String> = state.applied_ids().into_iter().collect();
        let mut runnable = Vec::new();
        for id in wave {
            let Some(descriptor) = descriptors.get(id.as_str()).copied() else {
                continue;
            };
            if ctx.cancel.is_cancelled() {
                reports.insert(id.clone(), ModuleReport::cancelled(id));
                continue;
            }
            let missing: Vec<String> = descriptor
                .requires
                .iter()
                .filter(|req| !applied.contains(*req))
                .cloned()
                .collect();
            if missing.is_empty() {
                runnable.push(descriptor);
            } else {
                ctx.reporter
                    .warn(&format!("{id}: skipped: unmet dependency: {}", missing.join(", ")));
                reports.insert(id.clone(), ModuleReport::skipped_unmet(id, &missing));
            }
        }

        if parallel && !ctx.cancel.is_cancelled() {
            let results = join_all(
                runnable
                    .iter()
                    .map(|descriptor| run_module(ctx, &state, descriptor, suite, &scope)),
            )
            .await;
            for report in results {
                reports.insert(report.module.clone(), report);
            }
        } else {
            for descriptor in runnable {
                let report = if ctx.cancel.is_cancelled() {
                    ModuleReport::cancelled(&descriptor.id)
                } else {
                    run_module(ctx, &state, descriptor, suite, &scope).await
                };
                reports.insert(report.module.clone(), report);
            }
        }
    }

    let summary = teardown(
        ctx.provisioner,
        state,
        suite.settings.timeouts.destroy(),
        ctx.reporter,
    )
    .await;

    let modules = suite
        .modules
        .iter()
        .filter_map(|m| reports.remove(&m.id))
        .collect();
    Ok(RunReport {
        run_id: opts.run_id.clone(),
        started_at,
        finished_at: Utc::now(),
        modules,
        destroyed: summary.destroyed,
        teardown_failures: summary.failures,
    })
}

/// Wire, apply, register and validate one module. A panic anywhere in
/// these steps becomes a failed report so the run still reaches teardown.
async fn run_module<P, S, L, R>(
    ctx: &RunContext<'_, P, S, L, R>,
    state: &RunState<'_, L>,
    descriptor: &ModuleDescriptor,
    suite: &SuiteConfig,
    scope: &Scope,
) -> ModuleReport
where
    P: Provisioner,
    S: ResourceStateReader,
    L: LedgerStore,
    R: ProgressReporter,
{
    let id = descriptor.id.as_str();
    let outcome = AssertUnwindSafe(apply_and_validate(ctx, state, descriptor, suite, scope))
        .catch_unwind()
        .await;
    let panic = match outcome {
        Ok(report) => return report,
        Err(panic) => panic,
    };

    let message = panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    // Registration happens right after apply, so a registered module
    // panicked during validation.
    match state.applied(id) {
        Some(applied) => {
            tracing::error!(module = id, panic = %message, "validation panicked");
            ctx.reporter.warn(&format!("{id}: validation panicked: {message}"));
            failed(
                id,
                Cause::ValidationPanicked,
                format!("validation panicked: {message}"),
                Some(applied.applied_at),
            )
        }
        None => {
            tracing::error!(module = id, panic = %message, "provisioning panicked");
            ctx.reporter.warn(&format!("{id}: provisioning panicked: {message}"));
            failed(
                id,
                Cause::ProvisionError,
                format!("provisioning panicked: {message}"),
                None,
            )
        }
    }
}

async fn apply_and_validate<P, S, L, R>(
    ctx: &RunContext<'_, P, S, L, R>,
    state: &RunState<'_, L>,
    descriptor: &ModuleDescriptor,
    suite: &SuiteConfig,
    scope: &Scope,
) -> ModuleReport
where
    P: Provisioner,
    S: ResourceStateReader,
    L: LedgerStore,
    R: ProgressReporter,
{
    let id = descriptor.id.as_str();
    let timeouts = &suite.settings.timeouts;

    let wired = match wire_inputs(ctx.provisioner, state, descriptor, timeouts.output()).await {
        Ok(wired) => wired,
        Err((cause, message)) => return failed(id, cause, message, None),
    };
    let vars = descriptor.merged_vars(wired);

    ctx.reporter.step(&format!("applying {id}..."));
    let apply = ctx.provisioner.apply(descriptor, &vars);
    let applied = match tokio::time::timeout(timeouts.apply(), apply).await {
        Ok(Ok(applied)) => applied,
        Ok(Err(e)) => return apply_failed(ctx.reporter, id, &e),
        Err(_) => {
            let e = ProvisionError::Timeout {
                module: id.to_string(),
                secs: timeouts.apply().as_secs(),
            };
            return apply_failed(ctx.reporter, id, &e);
        }
    };
    let applied_at = applied.applied_at;
    state.register(applied.clone()).await;
    tracing::info!(module = id, "applied");

    let validation =
        validate_module(ctx.provisioner, ctx.reader, &applied, scope, timeouts).await;

    let passed = validation.passed();
    let (cause, message) = match validation.failure {
        Some((cause, message)) => (Some(cause), Some(message)),
        None if !passed => {
            let failing = validation.assertions.iter().filter(|a| !a.passed).count();
            (
                Some(Cause::AssertionFailed),
                Some(format!("{failing} assertion(s) failed")),
            )
        }
        None => (None, None),
    };

    if passed {
        ctx.reporter.success(&format!("{id} passed"));
    } else {
        ctx.reporter.warn(&format!("{id} failed"));
    }

    ModuleReport {
        module: id.to_string(),
        status: if passed {
            ModuleStatus::Passed
        } else {
            ModuleStatus::Failed
        },
        cause,
        message,
        assertions: validation.assertions,
        applied_at: Some(applied_at),
    }
}

/// Resolve `inputs_from` against already-applied prerequisites.
async fn wire_inputs<L: LedgerStore>(
    provisioner: &impl Provisioner,
    state: &RunState<'_, L>,
    descriptor: &ModuleDescriptor,
    timeout: std::time::Duration,
) -> Result<Variables, (Cause, String)> {
    let mut wired = Variables::new();
    for (var, source) in &descriptor.inputs_from {
        let Some(prerequisite) = state.applied(&source.module) else {
            return Err((
                Cause::UnmetDependency,
                format!("input '{var}': module '{}' is not applied", source.module),
            ));
        };
        let value = raw_output(provisioner, &prerequisite, &source.output, timeout)
            .await
            .map_err(|e| (e.cause(), format!("input '{var}': {e}")))?;
        wired.insert(var.clone(), value);
    }
    Ok(wired)
}

fn apply_failed(reporter: &impl ProgressReporter, id: &str, e: &ProvisionError) -> ModuleReport {
    tracing::error!(module = id, error = %e, "apply failed");
    reporter.warn(&e.to_string());
    failed(id, e.cause(), e.to_string(), None)
}

fn failed(
    id: &str,
    cause: Cause,
    message: String,
    applied_at: Option<chrono::DateTime<Utc>>,
) -> ModuleReport {
    ModuleReport {
        module: id.to_string(),
        status: ModuleStatus::Failed,
        cause: Some(cause),
        message: Some(message),
        assertions: Vec::new(),
        applied_at,
    }
}
