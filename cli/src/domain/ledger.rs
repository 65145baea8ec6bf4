//! Run ledger: the persisted record of modules applied by one run.
//!
//! Pure types and validation. Persistence lives in `crate::infra::ledger`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::LedgerError;
use crate::domain::module::AppliedModule;

/// Modules applied by a run and not yet destroyed, in apply order.
///
/// Persisted to `~/.stackcheck/runs/<run-id>.json` after every apply and
/// destroy, so an interrupted run can be cleaned up later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLedger {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// Engine binary the modules were applied with.
    pub binary: String,
    #[serde(default)]
    pub applied: Vec<AppliedModule>,
}

impl RunLedger {
    #[must_use]
    pub fn new(run_id: String, binary: String, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            binary,
            applied: Vec::new(),
        }
    }

    /// Remove a module by id, returning whether it was present.
    pub fn remove(&mut self, module: &str) -> bool {
        let before = self.applied.len();
        self.applied.retain(|m| m.id() != module);
        self.applied.len() != before
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Validates run id format: `run-` followed by exactly 16 hex characters.
///
/// # Errors
///
/// Returns an error if the id doesn't match the expected format.
pub fn validate_run_id(id: &str) -> Result<(), LedgerError> {
    let valid = id.len() == 20
        && id.starts_with("run-")
        && id[4..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(LedgerError::InvalidRunId(id.to_string()))
    }
}

/// Generate a unique run identifier.
///
/// Format: `run-` followed by 16 lowercase hex characters.
/// Entropy sources: nanosecond timestamp and two independent `RandomState` hashes.
#[must_use]
pub fn generate_run_id() -> String {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u128(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
    );
    hasher.write_u64(RandomState::new().build_hasher().finish());
    hasher.write_u64(RandomState::new().build_hasher().finish());
    format!("run-{:016x}", hasher.finish())
}
