//! Suite file schema and validation.
//!
//! Pure functions only — no I/O, no async, no filesystem access.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::module::ModuleDescriptor;
use crate::domain::resource::Scope;
use crate::domain::retry::RetryPolicy;

// ── Suite schema ─────────────────────────────────────────────────────────────

/// Top-level suite file, `stackcheck.yaml` by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteConfig {
    #[serde(default)]
    pub settings: Settings,
    pub modules: Vec<ModuleDescriptor>,
}

/// Run-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Engine binary: `terraform` (default), `tofu`, or `terragrunt`.
    pub binary: String,
    /// Default region for live resource checks.
    pub region: String,
    /// Optional named provider profile for live resource checks.
    pub profile: Option<String>,
    /// Apply independent modules of a wave concurrently.
    pub parallel: bool,
    pub timeouts: Timeouts,
    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            binary: "terraform".to_string(),
            region: "us-east-1".to_string(),
            profile: None,
            parallel: false,
            timeouts: Timeouts::default(),
            retry: RetrySettings::default(),
        }
    }
}

/// Per-operation timeouts, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub apply_secs: u64,
    pub destroy_secs: u64,
    pub output_secs: u64,
    pub read_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            apply_secs: 30 * 60,
            destroy_secs: 30 * 60,
            output_secs: 2 * 60,
            read_secs: 60,
        }
    }
}

impl Timeouts {
    #[must_use]
    pub fn apply(&self) -> Duration {
        Duration::from_secs(self.apply_secs)
    }

    #[must_use]
    pub fn destroy(&self) -> Duration {
        Duration::from_secs(self.destroy_secs)
    }

    #[must_use]
    pub fn output(&self) -> Duration {
        Duration::from_secs(self.output_secs)
    }

    #[must_use]
    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    /// Longest single operation; used as the engine command ceiling.
    #[must_use]
    pub fn longest(&self) -> Duration {
        Duration::from_secs(
            self.apply_secs
                .max(self.destroy_secs)
                .max(self.output_secs)
                .max(self.read_secs),
        )
    }
}

/// Retry settings for transient engine errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub backoff_secs: u64,
    pub max_backoff_secs: u64,
    /// Additional retryable error regexes on top of the built-in list.
    pub extra_patterns: Vec<String>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_secs: 5,
            max_backoff_secs: 60,
            extra_patterns: Vec::new(),
        }
    }
}

impl RetrySettings {
    /// Compile into a `RetryPolicy`.
    ///
    /// # Errors
    ///
    /// Returns an error if an extra pattern is not a valid regex.
    pub fn policy(&self) -> Result<RetryPolicy, ConfigError> {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_secs(self.backoff_secs),
            Duration::from_secs(self.max_backoff_secs),
            &self.extra_patterns,
        )
    }
}

impl SuiteConfig {
    /// Validate settings and every module descriptor.
    ///
    /// Dependency structure (cycles, duplicates) is checked by the planner.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.modules.is_empty() {
            return Err(ConfigError::NoModules);
        }
        self.settings.retry.policy()?;
        for module in &self.modules {
            module.validate()?;
        }
        Ok(())
    }

    /// Default lookup scope for live resource checks.
    #[must_use]
    pub fn scope(&self) -> Scope {
        Scope {
            region: self.settings.region.clone(),
            profile: self.settings.profile.clone(),
        }
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
