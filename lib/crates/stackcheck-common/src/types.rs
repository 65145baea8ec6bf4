use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final status of one module in a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    Passed,
    Failed,
    Skipped,
    /// Never started because the run was cancelled.
    Cancelled,
}

impl ModuleStatus {
    /// Whether this status lets the overall run succeed.
    #[must_use]
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Passed | Self::Skipped)
    }
}

/// Why a module did not pass
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Cause {
    ProvisionError,
    ProvisionTimeout,
    OutputMissing,
    OutputTypeMismatch,
    OutputTimeout,
    AssertionFailed,
    ValidationPanicked,
    UnmetDependency,
    Cancelled,
}

/// Outcome of one predicate against one output or live attribute
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssertionResult {
    /// What was checked, e.g. `output.vpc_id` or `vpc(vpc-123).tags.Environment`.
    pub subject: String,
    /// Predicate in display form, e.g. `length == 3`.
    pub predicate: String,
    pub passed: bool,
    /// Human-readable explanation; names expected and actual on failure.
    pub explanation: String,
}

/// Per-module summary, immutable once the module's validation phase completes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleReport {
    pub module: String,
    pub status: ModuleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Cause>,
    /// Failure or skip explanation (e.g. "skipped: unmet dependency: vpc").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub assertions: Vec<AssertionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
}

impl ModuleReport {
    /// Report for a module that was never applied because a prerequisite is
    /// unavailable.
    #[must_use]
    pub fn skipped_unmet(module: &str, missing: &[String]) -> Self {
        Self {
            module: module.to_string(),
            status: ModuleStatus::Skipped,
            cause: Some(Cause::UnmetDependency),
            message: Some(format!("skipped: unmet dependency: {}", missing.join(", "))),
            assertions: Vec::new(),
            applied_at: None,
        }
    }

    /// Report for a module the run never reached because it was cancelled.
    #[must_use]
    pub fn cancelled(module: &str) -> Self {
        Self {
            module: module.to_string(),
            status: ModuleStatus::Cancelled,
            cause: Some(Cause::Cancelled),
            message: Some("skipped: run cancelled".to_string()),
            assertions: Vec::new(),
            applied_at: None,
        }
    }

    /// Number of failing assertion results.
    #[must_use]
    pub fn failed_assertions(&self) -> usize {
        self.assertions.iter().filter(|a| !a.passed).count()
    }
}

/// A destroy attempt that did not succeed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeardownFailure {
    pub module: String,
    pub message: String,
}

/// Consolidated result of one harness run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Module reports in plan order.
    pub modules: Vec<ModuleReport>,
    /// Modules destroyed, in the order destroy was invoked.
    #[serde(default)]
    pub destroyed: Vec<String>,
    #[serde(default)]
    pub teardown_failures: Vec<TeardownFailure>,
}

impl RunReport {
    /// `true` iff every module passed or was skipped and teardown was clean.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.modules.iter().all(|m| m.status.is_ok()) && self.teardown_failures.is_empty()
    }

    #[must_use]
    pub fn count(&self, status: ModuleStatus) -> usize {
        self.modules.iter().filter(|m| m.status == status).count()
    }
}

/// A module the sequencer will not apply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedModule {
    pub module: String,
    pub missing: Vec<String>,
}

/// Apply order as reported by `stackcheck plan`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanOutput {
    pub waves: Vec<Vec<String>>,
    pub skipped: Vec<SkippedModule>,
}
