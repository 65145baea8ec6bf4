//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` — never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;

use crate::domain::{
    AppliedModule, DestroyError, ModuleDescriptor, OutputError, ProvisionError, ReadError,
    ResourceAttributes, ResourceRef, RunLedger, Scope, Variables,
};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(&self, program: &str, args: &[&str], timeout: Duration)
    -> Result<Output>;
}

// ── Provisioner Port ──────────────────────────────────────────────────────────

/// Drives the declarative infrastructure engine for one module at a time.
#[allow(async_fn_in_trait)]
pub trait Provisioner {
    /// Realize the module's resources with the fully resolved `vars`.
    ///
    /// Transient engine errors are retried internally; anything else fails
    /// on the first attempt.
    async fn apply(
        &self,
        module: &ModuleDescriptor,
        vars: &Variables,
    ) -> Result<AppliedModule, ProvisionError>;
    /// Release everything `apply` created. Succeeds on an already partially
    /// or fully destroyed module.
    async fn destroy(&self, module: &AppliedModule) -> Result<(), DestroyError>;
    /// Raw value of a named output; `OutputError::Missing` if absent.
    async fn output(&self, module: &AppliedModule, name: &str) -> Result<Value, OutputError>;
}

// ── Resource State Port ───────────────────────────────────────────────────────

/// Read-only access to provider-observed resource state.
#[allow(async_fn_in_trait)]
pub trait ResourceStateReader {
    /// Look a resource up by identifier. No caching: every call queries.
    async fn read(
        &self,
        resource: &ResourceRef,
        scope: &Scope,
    ) -> Result<ResourceAttributes, ReadError>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Progress events from services to whatever renders them. Methods are
/// synchronous.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Ledger Port ───────────────────────────────────────────────────────────────

/// Abstracts run ledger persistence.
#[allow(async_fn_in_trait)]
pub trait LedgerStore {
    /// Persist the given ledger, replacing any previous version.
    async fn save_async(&self, ledger: &RunLedger) -> Result<()>;
    /// Delete the ledger for `run_id`. Succeeds if it does not exist.
    async fn remove_async(&self, run_id: &str) -> Result<()>;
    /// All ledgers currently on disk, oldest first.
    async fn list_async(&self) -> Result<Vec<RunLedger>>;
}
