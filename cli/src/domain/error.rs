//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use stackcheck_common::Cause;
use thiserror::Error;

use crate::domain::output::OutputKind;

// ── Provisioning errors ───────────────────────────────────────────────────────

/// Errors raised while applying a module.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("apply of module '{module}' failed: {message}")]
    Failed { module: String, message: String },

    #[error("apply of module '{module}' timed out after {secs}s")]
    Timeout { module: String, secs: u64 },
}

/// Errors raised while destroying a module.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DestroyError {
    #[error("destroy of module '{module}' failed: {message}")]
    Failed { module: String, message: String },

    #[error("destroy of module '{module}' timed out after {secs}s")]
    Timeout { module: String, secs: u64 },
}

impl ProvisionError {
    #[must_use]
    pub fn cause(&self) -> Cause {
        match self {
            Self::Failed { .. } => Cause::ProvisionError,
            Self::Timeout { .. } => Cause::ProvisionTimeout,
        }
    }
}

// ── Output errors ─────────────────────────────────────────────────────────────

/// Errors raised while reading or typing a module output.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OutputError {
    #[error("module '{module}' has no output named '{name}'")]
    Missing { module: String, name: String },

    #[error("output '{name}' of module '{module}' is {actual}, expected {expected}")]
    TypeMismatch {
        module: String,
        name: String,
        expected: OutputKind,
        actual: String,
    },

    #[error("reading outputs of module '{module}' failed: {message}")]
    Unavailable { module: String, message: String },

    #[error("reading outputs of module '{module}' timed out after {secs}s")]
    Timeout { module: String, secs: u64 },
}

impl OutputError {
    #[must_use]
    pub fn cause(&self) -> Cause {
        match self {
            Self::Missing { .. } | Self::Unavailable { .. } => Cause::OutputMissing,
            Self::TypeMismatch { .. } => Cause::OutputTypeMismatch,
            Self::Timeout { .. } => Cause::OutputTimeout,
        }
    }
}

// ── Plan errors ───────────────────────────────────────────────────────────────

/// Structural configuration errors, caught before any resource is touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("dependency cycle: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("module '{0}' is declared more than once")]
    DuplicateModule(String),

    #[error("module '{0}' is not declared in the suite")]
    UnknownModule(String),

    #[error(
        "module '{module}' takes input '{var}' from '{source_module}', which is not in its requires list"
    )]
    UndeclaredInputSource {
        module: String,
        var: String,
        source_module: String,
    },
}

// ── Resource state errors ─────────────────────────────────────────────────────

/// Errors raised by the live resource-state reader.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReadError {
    #[error("{kind} '{id}' not found in {region}")]
    NotFound {
        kind: String,
        id: String,
        region: String,
    },

    #[error("reading {kind} '{id}' failed: {message}")]
    Failed {
        kind: String,
        id: String,
        message: String,
    },
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors in the suite file contents.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid module id '{0}': must match ^[a-z0-9][a-z0-9_-]*$")]
    InvalidModuleId(String),

    #[error("Module '{0}' has an empty dir")]
    EmptyDir(String),

    #[error("Module '{module}' checks a resource by output '{output}', which is not declared")]
    UndeclaredIdOutput { module: String, output: String },

    #[error(
        "Module '{module}' checks a resource by output '{output}', which is declared as {kind} (must be scalar)"
    )]
    NonScalarIdOutput {
        module: String,
        output: String,
        kind: OutputKind,
    },

    #[error("Invalid retryable error pattern '{pattern}': {message}")]
    InvalidRetryPattern { pattern: String, message: String },

    #[error("Suite declares no modules")]
    NoModules,
}

// ── Ledger errors ─────────────────────────────────────────────────────────────

/// Errors in run ledger identity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid run id '{0}': expected 'run-' followed by 16 hex characters")]
    InvalidRunId(String),
}
