//! `stackcheck cleanup` — destroy modules left behind by interrupted runs.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use stackcheck_common::TeardownFailure;

use crate::app::AppContext;
use crate::application::services::cleanup::{cleanup_run, stale_ledgers};
use crate::domain::Settings;
use crate::output::{SpinnerReporter, TerminalReporter, json, progress};

/// Arguments for the cleanup command.
#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Debug, Default, Serialize)]
struct CleanupOutput {
    runs: Vec<String>,
    destroyed: Vec<String>,
    failures: Vec<TeardownFailure>,
}

/// Run `stackcheck cleanup`.
///
/// # Errors
///
/// Returns an error if the ledger directory cannot be read or the prompt
/// fails.
pub async fn run(app: &AppContext, args: &CleanupArgs) -> Result<ExitCode> {
    let store = app.ledger()?;
    let stale = stale_ledgers(&store).await?;
    let mut out = CleanupOutput::default();

    if stale.is_empty() {
        if app.is_json() {
            println!("{}", json::to_pretty(&out)?);
        } else {
            app.output.info("No leftover runs.");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let modules: usize = stale.iter().map(|l| l.applied.len()).sum();
    if !app.is_json() {
        app.output.header("Leftover runs");
        for ledger in &stale {
            let ids: Vec<&str> = ledger.applied.iter().map(|m| m.id()).collect();
            app.output.kv(
                &format!("{} ({}):", ledger.run_id, ledger.started_at.format("%Y-%m-%d %H:%M")),
                &ids.join(", "),
            );
        }
    }

    let prompt = format!("Destroy {modules} module(s) from {} run(s)?", stale.len());
    if !app.confirm(&prompt, args.yes)? {
        app.output.info("Cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    for ledger in stale {
        let settings = Settings {
            binary: ledger.binary.clone(),
            ..Settings::default()
        };
        let provisioner = app.provisioner(&settings)?;
        let timeout = settings.timeouts.destroy();
        out.runs.push(ledger.run_id.clone());

        let summary = if app.output.show_progress() {
            let pb = progress::spinner(&format!("cleaning up {}", ledger.run_id));
            let reporter = SpinnerReporter::new(&app.output, &pb);
            let run_id = ledger.run_id.clone();
            let summary = cleanup_run(&provisioner, &store, ledger, timeout, &reporter).await;
            if summary.failures.is_empty() {
                progress::finish_ok(&pb, &format!("cleaned up {run_id}"));
            } else {
                progress::finish_error(&pb, &format!("{run_id}: some destroys failed"));
            }
            summary
        } else {
            let reporter = TerminalReporter::new(&app.output);
            cleanup_run(&provisioner, &store, ledger, timeout, &reporter).await
        };
        out.destroyed.extend(summary.destroyed);
        out.failures.extend(summary.failures);
    }

    if app.is_json() {
        println!("{}", json::to_pretty(&out)?);
    } else {
        for failure in &out.failures {
            app.output
                .error(&format!("teardown of {} failed: {}", failure.module, failure.message));
        }
        if out.failures.is_empty() {
            app.output
                .success(&format!("Destroyed {} module(s).", out.destroyed.len()));
        }
    }

    Ok(if out.failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
