//! Domain layer — pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod assertion;
pub mod config;
pub mod error;
pub mod ledger;
pub mod module;
pub mod output;
pub mod plan;
pub mod resource;
pub mod retry;

pub use assertion::Predicate;
pub use config::{Settings, SuiteConfig, Timeouts};
pub use error::{
    ConfigError, DestroyError, LedgerError, OutputError, PlanError, ProvisionError, ReadError,
};
pub use ledger::{RunLedger, generate_run_id, validate_run_id};
pub use module::{AppliedModule, ModuleDescriptor, ProvisionHandle, Variables};
pub use output::{OutputKind, OutputValue, TypedValue, type_output};
pub use plan::{Plan, plan};
pub use resource::{ResourceAttributes, ResourceKind, ResourceRef, Scope};
pub use retry::RetryPolicy;
