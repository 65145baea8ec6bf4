//! `stackcheck run` — provision, validate and tear down a suite.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::suite_run::{Cancellation, RunContext, RunOptions, run_suite};
use crate::commands::SuiteArgs;
use crate::domain::generate_run_id;
use crate::infra::config::load_suite;
use crate::output::{TerminalReporter, json};

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub suite: SuiteArgs,

    /// Apply independent modules of a wave concurrently
    #[arg(long)]
    pub parallel: bool,
}

/// Run `stackcheck run`.
///
/// Exits non-zero if any module failed or was cancelled, or if any teardown
/// failed.
///
/// # Errors
///
/// Returns an error if the suite cannot be loaded or is structurally
/// invalid; nothing has been applied in that case.
pub async fn run(app: &AppContext, args: &RunArgs) -> Result<ExitCode> {
    let suite = load_suite(&args.suite.suite)?;
    let provisioner = app.provisioner(&suite.settings)?;
    let reader = app.reader();
    let ledger = app.ledger()?;
    let reporter = TerminalReporter::new(&app.output);

    let cancel = Cancellation::new();
    let listener = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing in-flight modules then tearing down");
                cancel.cancel();
            }
        }
    });

    let opts = RunOptions {
        run_id: generate_run_id(),
        only: args.suite.only.clone(),
        parallel: args.parallel,
    };
    let ctx = RunContext {
        provisioner: &provisioner,
        reader: &reader,
        ledger: &ledger,
        reporter: &reporter,
        cancel: &cancel,
    };
    let result = run_suite(&ctx, &suite, &opts).await;
    listener.abort();
    let report = result?;

    if app.is_json() {
        println!("{}", json::to_pretty(&report)?);
    } else {
        app.renderer().render_run_report(&report);
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
