//! `TerminalReporter` — Presentation-layer implementation of `ProgressReporter`.
//!
//! Wraps `&OutputContext` so application services can emit progress events
//! without depending on any presentation type directly.

use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::OutputContext;

/// Terminal progress reporter that wraps an `OutputContext`.
///
/// - `step()` prints `"  → {message}"`
/// - `success()` prints `"  ✓ {message}"`
/// - `warn()` prints `"  ! {message}"`
///
/// All three are suppressed when `ctx.quiet`. Progress goes to stderr so a
/// `--json` document on stdout stays parseable.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
}

impl<'a> TerminalReporter<'a> {
    /// Create a new `TerminalReporter` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        if !self.ctx.quiet {
            eprintln!("  {} {message}", "→".style(self.ctx.styles.info));
        }
    }

    fn success(&self, message: &str) {
        if !self.ctx.quiet {
            eprintln!("  {} {message}", "✓".style(self.ctx.styles.passed));
        }
    }

    fn warn(&self, message: &str) {
        if !self.ctx.quiet {
            eprintln!("  {} {message}", "!".style(self.ctx.styles.skipped));
        }
    }
}

/// Progress reporter that drives an `indicatif` spinner: steps update the
/// spinner message, successes and warnings are printed above it.
pub struct SpinnerReporter<'a> {
    ctx: &'a OutputContext,
    pb: &'a indicatif::ProgressBar,
}

impl<'a> SpinnerReporter<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext, pb: &'a indicatif::ProgressBar) -> Self {
        Self { ctx, pb }
    }
}

impl ProgressReporter for SpinnerReporter<'_> {
    fn step(&self, message: &str) {
        self.pb.set_message(message.to_string());
    }

    fn success(&self, message: &str) {
        self.pb
            .println(format!("  {} {message}", "✓".style(self.ctx.styles.passed)));
    }

    fn warn(&self, message: &str) {
        self.pb
            .println(format!("  {} {message}", "!".style(self.ctx.styles.skipped)));
    }
}
