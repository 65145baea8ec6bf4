//! Module descriptors and applied-module records.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::assertion::Predicate;
use crate::domain::error::ConfigError;
use crate::domain::output::OutputKind;
use crate::domain::resource::ResourceKind;

/// Input variables passed to the provisioner, by name.
pub type Variables = BTreeMap<String, Value>;

/// A provisionable unit as declared in the suite file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleDescriptor {
    /// Unique module identifier within the suite.
    pub id: String,
    /// Directory holding the module's declarative description.
    pub dir: PathBuf,
    /// Literal input variables, e.g. `environment: test`.
    #[serde(default)]
    pub vars: Variables,
    /// Prerequisite module ids, applied before this module.
    #[serde(default)]
    pub requires: Vec<String>,
    /// Input variables wired from a prerequisite's outputs.
    #[serde(default)]
    pub inputs_from: BTreeMap<String, InputSource>,
    /// Output checks evaluated after apply.
    #[serde(default)]
    pub outputs: Vec<OutputCheck>,
    /// Live resource checks evaluated after apply.
    #[serde(default)]
    pub resources: Vec<ResourceCheck>,
}

/// Output of a prerequisite module used as an input variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputSource {
    pub module: String,
    pub output: String,
}

/// A declared output with its expected kind and predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputCheck {
    pub name: String,
    pub kind: OutputKind,
    #[serde(default)]
    pub expect: Vec<Predicate>,
}

/// A live cross-check of a resource identified by one of the module's outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceCheck {
    pub kind: ResourceKind,
    /// Name of the scalar output holding the resource identifier.
    pub id_from: String,
    /// Region override; defaults to the suite's region.
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub expect: Vec<AttributeCheck>,
}

/// Predicates over one selected live attribute (`status`, `tags.<Key>`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeCheck {
    pub attribute: String,
    pub checks: Vec<Predicate>,
}

/// Opaque handle the provisioner needs to address an applied module again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionHandle {
    pub dir: PathBuf,
    /// The fully resolved variable set used for apply; destroy reuses it.
    pub vars: Variables,
}

/// A module that was successfully applied and has not yet been destroyed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedModule {
    pub descriptor: ModuleDescriptor,
    pub handle: ProvisionHandle,
    pub applied_at: DateTime<Utc>,
}

impl AppliedModule {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }
}

impl ModuleDescriptor {
    /// Literal vars merged with resolved `inputs_from` values; wired inputs win.
    #[must_use]
    pub fn merged_vars(&self, wired: Variables) -> Variables {
        let mut vars = self.vars.clone();
        vars.extend(wired);
        vars
    }

    /// Look up a declared output check by name.
    #[must_use]
    pub fn output_check(&self, name: &str) -> Option<&OutputCheck> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Structural validation of a single descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is malformed, the dir is empty, or a live
    /// check references an undeclared or non-scalar output.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_module_id(&self.id)?;
        if self.dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDir(self.id.clone()));
        }
        for check in &self.resources {
            match self.output_check(&check.id_from) {
                None => {
                    return Err(ConfigError::UndeclaredIdOutput {
                        module: self.id.clone(),
                        output: check.id_from.clone(),
                    });
                }
                Some(out) if out.kind != OutputKind::Scalar => {
                    return Err(ConfigError::NonScalarIdOutput {
                        module: self.id.clone(),
                        output: check.id_from.clone(),
                        kind: out.kind,
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Validate a module id: lowercase alphanumerics, `-` and `_`, not starting
/// with a separator.
///
/// # Errors
///
/// Returns an error if the id does not match `^[a-z0-9][a-z0-9_-]*$`.
pub fn validate_module_id(id: &str) -> Result<(), ConfigError> {
    let mut chars = id.chars();
    let valid_first = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let valid_rest =
        chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid_first && valid_rest {
        Ok(())
    } else {
        Err(ConfigError::InvalidModuleId(id.to_string()))
    }
}
