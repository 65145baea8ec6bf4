//! Human-readable terminal renderer.

use owo_colors::OwoColorize as _;
use stackcheck_common::{ModuleReport, ModuleStatus, PlanOutput, RunReport, TeardownFailure};

use crate::output::OutputContext;

/// Renders run results as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str) {
        println!("stackcheck {version}");
    }

    /// Render the apply plan.
    pub fn render_plan(&self, plan: &PlanOutput) {
        if self.ctx.quiet {
            return;
        }
        println!();
        self.ctx.header("Apply plan");
        println!();
        for (i, wave) in plan.waves.iter().enumerate() {
            self.ctx.kv(&format!("wave {}:", i + 1), &wave.join(", "));
        }
        if plan.waves.is_empty() {
            self.ctx.info("Nothing to apply.");
        }
        for skip in &plan.skipped {
            self.ctx.warn(&format!(
                "{} skipped: unmet dependency: {}",
                skip.module,
                skip.missing.join(", ")
            ));
        }
        println!();
    }

    /// Render a finished run: one block per module, teardown, then totals.
    ///
    /// In quiet mode only failures are printed.
    pub fn render_run_report(&self, report: &RunReport) {
        if self.ctx.quiet {
            for module in report.modules.iter().filter(|m| !m.status.is_ok()) {
                self.ctx.error(&module_line(module));
            }
            for failure in &report.teardown_failures {
                self.ctx.error(&teardown_line(failure));
            }
            return;
        }

        println!();
        let elapsed = report.finished_at - report.started_at;
        self.ctx.header(&format!(
            "Run {} ({}s)",
            report.run_id,
            elapsed.num_seconds()
        ));
        println!();

        for module in &report.modules {
            self.render_module(module);
        }

        println!();
        if !report.destroyed.is_empty() {
            self.ctx.kv("Destroyed:", &report.destroyed.join(", "));
        }
        for failure in &report.teardown_failures {
            self.ctx.error(&teardown_line(failure));
        }

        let summary = format!(
            "{} passed, {} failed, {} skipped, {} cancelled",
            report.count(ModuleStatus::Passed),
            report.count(ModuleStatus::Failed),
            report.count(ModuleStatus::Skipped),
            report.count(ModuleStatus::Cancelled),
        );
        println!();
        if report.passed() {
            self.ctx.success(&summary);
        } else {
            self.ctx.error(&summary);
        }
    }

    fn render_module(&self, module: &ModuleReport) {
        let styles = &self.ctx.styles;
        let (glyph, style) = styles.status(module.status);
        println!("  {} {}", glyph.style(style), module_line(module).style(styles.bold));

        for assertion in &module.assertions {
            let (mark, mark_style) = styles.outcome(assertion.passed);
            println!(
                "      {} {}: {}",
                mark.style(mark_style),
                assertion.predicate.style(styles.dim),
                assertion.explanation
            );
        }
    }
}

pub(crate) fn module_line(module: &ModuleReport) -> String {
    let status = match module.status {
        ModuleStatus::Passed => "passed",
        ModuleStatus::Failed => "failed",
        ModuleStatus::Skipped => "skipped",
        ModuleStatus::Cancelled => "cancelled",
    };
    match (&module.message, module.status) {
        (Some(message), ModuleStatus::Skipped | ModuleStatus::Cancelled) => {
            format!("{}  {message}", module.module)
        }
        (Some(message), _) => format!("{}  {status}: {message}", module.module),
        (None, _) => format!(
            "{}  {status} ({} assertion(s))",
            module.module,
            module.assertions.len()
        ),
    }
}

fn teardown_line(failure: &TeardownFailure) -> String {
    format!("teardown of {} failed: {}", failure.module, failure.message)
}
