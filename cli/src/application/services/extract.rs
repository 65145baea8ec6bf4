//! Application service — output extraction.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::time::Duration;

use serde_json::Value;

use crate::application::ports::Provisioner;
use crate::domain::{AppliedModule, OutputError, OutputKind, OutputValue, type_output};

/// Read a raw output under `timeout`.
///
/// # Errors
///
/// Returns the provisioner's `OutputError`, or `OutputError::Timeout` if the
/// read does not finish in time.
pub async fn raw_output(
    provisioner: &impl Provisioner,
    module: &AppliedModule,
    name: &str,
    timeout: Duration,
) -> Result<Value, OutputError> {
    match tokio::time::timeout(timeout, provisioner.output(module, name)).await {
        Ok(result) => result,
        Err(_) => Err(OutputError::Timeout {
            module: module.id().to_string(),
            secs: timeout.as_secs(),
        }),
    }
}

/// Read output `name` of `module` and type it as `kind`.
///
/// # Errors
///
/// Returns `OutputError::Missing` if the module has no such output,
/// `OutputError::TypeMismatch` if its value is not of `kind`, and
/// `OutputError::Timeout` if the read exceeds `timeout`.
pub async fn extract(
    provisioner: &impl Provisioner,
    module: &AppliedModule,
    name: &str,
    kind: OutputKind,
    timeout: Duration,
) -> Result<OutputValue, OutputError> {
    let raw = raw_output(provisioner, module, name, timeout).await?;
    let value = type_output(module.id(), name, Some(raw), kind)?;
    tracing::debug!(module = module.id(), output = name, kind = ?kind, "output extracted");
    Ok(value)
}
