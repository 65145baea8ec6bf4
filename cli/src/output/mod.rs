//! Terminal and JSON presentation.
//!
//! Report documents (plan, run report, `--json` output) go to stdout.
//! Progress and diagnostics go to stderr so stdout stays parseable.

pub mod human;
pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use console::Term;
use owo_colors::{OwoColorize as _, Style};
pub use human::HumanRenderer;
pub use reporter::{SpinnerReporter, TerminalReporter};
pub use styles::Styles;

/// Output context carrying styling and terminal state.
pub struct OutputContext {
    pub styles: Styles,
    /// Whether stdout is a TTY; colors are only used when it is.
    pub is_tty: bool,
    /// Whether stderr is a TTY; spinners draw there.
    pub stderr_tty: bool,
    /// Suppress non-error output.
    pub quiet: bool,
}

impl OutputContext {
    /// Create output context from the `--no-color`/`--quiet` flags and the
    /// terminal. `NO_COLOR` in the environment also disables colors.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let mut styles = Styles::default();
        if !no_color && is_tty && std::env::var_os("NO_COLOR").is_none() {
            styles.colorize();
        }
        Self {
            styles,
            is_tty,
            stderr_tty: Term::stderr().is_term(),
            quiet,
        }
    }

    /// Spinners only make sense on an interactive, non-quiet stderr.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.stderr_tty && !self.quiet
    }

    fn line(&self, glyph: &str, style: Style, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", glyph.style(style));
        }
    }

    pub fn success(&self, msg: &str) {
        self.line("✓", self.styles.passed, msg);
    }

    pub fn warn(&self, msg: &str) {
        self.line("⚠", self.styles.skipped, msg);
    }

    /// Errors go to stderr and are never suppressed.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.failed));
    }

    pub fn info(&self, msg: &str) {
        self.line("ℹ", self.styles.info, msg);
    }

    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.header));
        }
    }

    /// Key-value line with the key dimmed.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.dim));
        }
    }
}
