//! `stackcheck plan` — show apply waves without touching any resource.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::commands::SuiteArgs;
use crate::domain::plan;
use crate::infra::config::load_suite;
use crate::output::json;

/// Run `stackcheck plan`.
///
/// # Errors
///
/// Returns an error if the suite cannot be loaded or its dependency graph is
/// invalid (cycle, duplicate id, unknown `--only` id).
pub fn run(app: &AppContext, args: &SuiteArgs) -> Result<ExitCode> {
    let suite = load_suite(&args.suite)?;
    let plan = plan(&suite.modules, &args.only)?.to_output();

    if app.is_json() {
        println!("{}", json::to_pretty(&plan)?);
    } else {
        app.renderer().render_plan(&plan);
    }
    Ok(ExitCode::SUCCESS)
}
