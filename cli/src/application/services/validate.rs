//! Application service — per-module validation.
//!
//! Extracts every declared output, evaluates its predicates, then cross-checks
//! live resource state. Every predicate is evaluated; a failure never
//! short-circuits the module's remaining checks.

use std::collections::HashMap;

use stackcheck_common::{AssertionResult, Cause};

use crate::application::ports::{Provisioner, ResourceStateReader};
use crate::application::services::extract::extract;
use crate::domain::module::ResourceCheck;
use crate::domain::{AppliedModule, OutputError, ResourceRef, Scope, Timeouts, TypedValue};

/// Outcome of validating one applied module.
#[derive(Debug, Default)]
pub struct Validation {
    pub assertions: Vec<AssertionResult>,
    /// Output contract violation, if any: the first error's cause plus all
    /// output error messages.
    pub failure: Option<(Cause, String)>,
}

impl Validation {
    /// `true` iff no output error occurred and every assertion passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failure.is_none() && self.assertions.iter().all(|a| a.passed)
    }
}

/// Validate `module`'s outputs and live resources.
pub async fn validate_module(
    provisioner: &impl Provisioner,
    reader: &impl ResourceStateReader,
    module: &AppliedModule,
    scope: &Scope,
    timeouts: &Timeouts,
) -> Validation {
    let mut validation = Validation::default();
    let mut errors: Vec<OutputError> = Vec::new();
    let mut typed: HashMap<&str, TypedValue> = HashMap::new();

    for check in &module.descriptor.outputs {
        match extract(provisioner, module, &check.name, check.kind, timeouts.output()).await {
            Ok(output) => {
                for predicate in &check.expect {
                    validation
                        .assertions
                        .push(predicate.evaluate(&check.name, Some(&output.value)));
                }
                typed.insert(check.name.as_str(), output.value);
            }
            Err(e) => {
                tracing::warn!(
                    module = module.id(),
                    output = %check.name,
                    error = %e,
                    "output check failed"
                );
                errors.push(e);
            }
        }
    }

    for check in &module.descriptor.resources {
        let id_value = typed.get(check.id_from.as_str());
        let results = check_resource(reader, module, check, id_value, scope, timeouts).await;
        validation.assertions.extend(results);
    }

    if let Some(first) = errors.first() {
        let message = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        validation.failure = Some((first.cause(), message));
    }
    validation
}

async fn check_resource(
    reader: &impl ResourceStateReader,
    module: &AppliedModule,
    check: &ResourceCheck,
    id_value: Option<&TypedValue>,
    scope: &Scope,
    timeouts: &Timeouts,
) -> Vec<AssertionResult> {
    let id = id_value
        .and_then(TypedValue::scalar_text)
        .filter(|id| !id.is_empty());
    let Some(id) = id else {
        return vec![AssertionResult {
            subject: format!("{}({})", check.kind, check.id_from),
            predicate: "exists".to_string(),
            passed: false,
            explanation: format!(
                "cannot read {}: identifier output '{}' is unavailable or empty",
                check.kind, check.id_from
            ),
        }];
    };

    let resource = ResourceRef { kind: check.kind, id };
    let scope = Scope {
        region: check.region.clone().unwrap_or_else(|| scope.region.clone()),
        profile: scope.profile.clone(),
    };

    let read = tokio::time::timeout(timeouts.read(), reader.read(&resource, &scope)).await;
    let attrs = match read {
        Ok(Ok(attrs)) => attrs,
        Ok(Err(e)) => return vec![unreadable(&resource, e.to_string())],
        Err(_) => {
            return vec![unreadable(
                &resource,
                format!("read timed out after {}s", timeouts.read().as_secs()),
            )];
        }
    };
    tracing::debug!(module = module.id(), resource = %resource, "live state read");

    let mut results = Vec::new();
    for attribute in &check.expect {
        let subject = format!("{resource}.{}", attribute.attribute);
        let selected = attrs.select(&attribute.attribute);
        for predicate in &attribute.checks {
            results.push(predicate.evaluate(&subject, selected.as_ref()));
        }
    }
    results
}

fn unreadable(resource: &ResourceRef, explanation: String) -> AssertionResult {
    AssertionResult {
        subject: resource.to_string(),
        predicate: "exists".to_string(),
        passed: false,
        explanation,
    }
}
