//! Suite file loading.

use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::SuiteConfig;

/// Default suite file name, looked up in the current directory.
pub const DEFAULT_SUITE_FILE: &str = "stackcheck.yaml";

/// Read, parse and validate a suite file.
///
/// Relative module `dir`s are resolved against the suite file's directory.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid YAML for the
/// suite schema, or fails validation.
pub fn load_suite(path: &Path) -> Result<SuiteConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read suite file {}", path.display()))?;
    let mut suite: SuiteConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("cannot parse suite file {}", path.display()))?;

    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    for module in &mut suite.modules {
        if module.dir.is_relative() && !module.dir.as_os_str().is_empty() {
            module.dir = base.join(&module.dir);
        }
    }

    suite
        .validate()
        .with_context(|| format!("invalid suite file {}", path.display()))?;
    tracing::debug!(path = %path.display(), modules = suite.modules.len(), "suite loaded");
    Ok(suite)
}
