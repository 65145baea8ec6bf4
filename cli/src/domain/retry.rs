//! Retry classification and backoff for transient provisioning errors.

use std::time::Duration;

use regex::Regex;

use crate::domain::error::ConfigError;

/// Transient engine/provider failures worth retrying, paired with a short
/// description used in logs.
pub const DEFAULT_RETRYABLE_ERRORS: &[(&str, &str)] = &[
    (
        r".*read: connection reset by peer.*",
        "connection reset by peer",
    ),
    (r".*transport is closing.*", "transport is closing"),
    (r".*TLS handshake timeout.*", "TLS handshake timeout"),
    (
        r"(?s).*Error installing provider.*tcp.*connection reset by peer.*",
        "provider download reset",
    ),
    (
        r".*Error: Failed to query available provider packages.*",
        "provider registry unavailable",
    ),
    (
        r".*could not query provider registry.*",
        "provider registry unavailable",
    ),
    (
        r"(?s).*Error: .*timeout while waiting for state.*",
        "timeout waiting for resource state",
    ),
    (r"(?s).*Throttling.*Rate exceeded.*", "provider throttling"),
    (r"(?s).*RequestLimitExceeded.*", "provider request limit exceeded"),
    (r"(?s).*Failed to load state.*", "state backend unavailable"),
    (
        r".*Provider produced inconsistent result.*",
        "provider produced inconsistent result",
    ),
];

/// How often and how patiently to retry a failed engine command.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `0` disables retrying.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    retryable: Vec<(Regex, String)>,
}

impl RetryPolicy {
    /// Build a policy from the default retryable errors plus `extra_patterns`.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern is not a valid regex.
    pub fn new(
        max_retries: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        extra_patterns: &[String],
    ) -> Result<Self, ConfigError> {
        let defaults = DEFAULT_RETRYABLE_ERRORS
            .iter()
            .map(|(pattern, why)| ((*pattern).to_string(), (*why).to_string()));
        let extras = extra_patterns.iter().map(|p| (p.clone(), p.clone()));

        let mut retryable = Vec::new();
        for (pattern, why) in defaults.chain(extras) {
            let re = Regex::new(&pattern).map_err(|e| ConfigError::InvalidRetryPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            retryable.push((re, why));
        }

        Ok(Self {
            max_retries,
            initial_backoff,
            max_backoff,
            retryable,
        })
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            retryable: Vec::new(),
        }
    }

    /// Return the description of the first retryable error class matching
    /// `output`, or `None` if the failure is not retryable.
    #[must_use]
    pub fn classify(&self, output: &str) -> Option<&str> {
        self.retryable
            .iter()
            .find(|(re, _)| re.is_match(output))
            .map(|(_, why)| why.as_str())
    }

    /// Delay before retry number `attempt` (0-based): doubles each time,
    /// capped at `max_backoff`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}
