//! Application service — clean up modules left behind by interrupted runs.

use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{LedgerStore, ProgressReporter, Provisioner};
use crate::application::services::teardown::{RunState, TeardownSummary, teardown};
use crate::domain::RunLedger;

/// Ledgers that still list applied modules, oldest first. Empty ledgers are
/// removed on the way.
///
/// # Errors
///
/// Returns an error if the ledger directory cannot be read.
pub async fn stale_ledgers(store: &impl LedgerStore) -> Result<Vec<RunLedger>> {
    let mut stale = Vec::new();
    for ledger in store.list_async().await? {
        if ledger.is_empty() {
            store.remove_async(&ledger.run_id).await?;
        } else {
            stale.push(ledger);
        }
    }
    Ok(stale)
}

/// Destroy every module listed in `ledger`, newest first.
///
/// The ledger file is removed once all modules are gone; modules whose
/// destroy fails stay listed.
pub async fn cleanup_run<L: LedgerStore>(
    provisioner: &impl Provisioner,
    store: &L,
    ledger: RunLedger,
    timeout: Duration,
    reporter: &impl ProgressReporter,
) -> TeardownSummary {
    tracing::info!(run_id = %ledger.run_id, modules = ledger.applied.len(), "cleaning up run");
    let state = RunState::new(store, ledger);
    teardown(provisioner, state, timeout, reporter).await
}
