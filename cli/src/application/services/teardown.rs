//! Application service — scoped teardown guarantee.
//!
//! `RunState` owns every module a run applied. `teardown` consumes it and
//! destroys each module exactly once, in reverse apply order, continuing past
//! failures. The on-disk ledger mirrors the applied list so a killed process
//! can still be cleaned up by `stackcheck cleanup`.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use stackcheck_common::TeardownFailure;

use crate::application::ports::{LedgerStore, ProgressReporter, Provisioner};
use crate::domain::{AppliedModule, DestroyError, RunLedger};

/// Modules applied by one run and not yet destroyed.
pub struct RunState<'a, L: LedgerStore> {
    ledger: Mutex<RunLedger>,
    /// Serializes snapshot-and-save so ledger writes land in order.
    persist: tokio::sync::Mutex<()>,
    store: &'a L,
}

/// What teardown did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TeardownSummary {
    /// Modules destroyed, in the order destroy was invoked.
    pub destroyed: Vec<String>,
    pub failures: Vec<TeardownFailure>,
}

impl<'a, L: LedgerStore> RunState<'a, L> {
    #[must_use]
    pub fn new(store: &'a L, ledger: RunLedger) -> Self {
        Self {
            ledger: Mutex::new(ledger),
            persist: tokio::sync::Mutex::new(()),
            store,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a successfully applied module. Call immediately after apply,
    /// before any validation.
    pub async fn register(&self, module: AppliedModule) {
        let _persist = self.persist.lock().await;
        let snapshot = {
            let mut ledger = self.lock();
            ledger.applied.push(module);
            ledger.clone()
        };
        if let Err(e) = self.store.save_async(&snapshot).await {
            tracing::warn!(run_id = %snapshot.run_id, error = %e, "failed to save run ledger");
        }
    }

    /// The applied module with id `module`, if registered.
    #[must_use]
    pub fn applied(&self, module: &str) -> Option<AppliedModule> {
        self.lock().applied.iter().find(|m| m.id() == module).cloned()
    }

    /// Ids of registered modules in apply order.
    #[must_use]
    pub fn applied_ids(&self) -> Vec<String> {
        self.lock()
            .applied
            .iter()
            .map(|m| m.id().to_string())
            .collect()
    }

    async fn forget(&self, module: &str) {
        let _persist = self.persist.lock().await;
        let snapshot = {
            let mut ledger = self.lock();
            ledger.remove(module);
            ledger.clone()
        };
        let saved = if snapshot.is_empty() {
            self.store.remove_async(&snapshot.run_id).await
        } else {
            self.store.save_async(&snapshot).await
        };
        if let Err(e) = saved {
            tracing::warn!(run_id = %snapshot.run_id, error = %e, "failed to update run ledger");
        }
    }
}

impl<L: LedgerStore> Drop for RunState<'_, L> {
    fn drop(&mut self) {
        let ledger = self.ledger.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !ledger.applied.is_empty() {
            let ids: Vec<&str> = ledger.applied.iter().map(AppliedModule::id).collect();
            tracing::error!(
                run_id = %ledger.run_id,
                modules = %ids.join(", "),
                "run state dropped without teardown; run `stackcheck cleanup` to destroy leftovers"
            );
        }
    }
}

/// Destroy every module in `state` in reverse apply order.
///
/// Each destroy runs under `timeout`. Failures are recorded and never stop
/// the remaining destroys. Modules whose destroy failed stay in the on-disk
/// ledger for `stackcheck cleanup`.
pub async fn teardown<L: LedgerStore>(
    provisioner: &impl Provisioner,
    state: RunState<'_, L>,
    timeout: Duration,
    reporter: &impl ProgressReporter,
) -> TeardownSummary {
    let modules = state.lock().applied.clone();
    let mut summary = TeardownSummary::default();

    for module in modules.iter().rev() {
        let id = module.id();
        reporter.step(&format!("destroying {id}..."));
        let result = match tokio::time::timeout(timeout, provisioner.destroy(module)).await {
            Ok(result) => result,
            Err(_) => Err(DestroyError::Timeout {
                module: id.to_string(),
                secs: timeout.as_secs(),
            }),
        };
        match result {
            Ok(()) => {
                tracing::info!(module = id, "destroyed");
                state.forget(id).await;
                summary.destroyed.push(id.to_string());
            }
            Err(e) => {
                tracing::error!(module = id, error = %e, "destroy failed");
                reporter.warn(&e.to_string());
                summary.failures.push(TeardownFailure {
                    module: id.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    // Every module has had its one destroy attempt; failures live on in the
    // on-disk ledger only.
    state.lock().applied.clear();
    summary
}
