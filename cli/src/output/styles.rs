//! Output styles using owo-colors stylesheet pattern

use owo_colors::Style;
use stackcheck_common::ModuleStatus;

/// Centralized stylesheet, keyed by outcome rather than by color.
#[derive(Default, Clone)]
pub struct Styles {
    /// Passed modules and assertions (green)
    pub passed: Style,
    /// Failed modules, assertions and teardowns (red)
    pub failed: Style,
    /// Skipped or cancelled modules and warnings (yellow)
    pub skipped: Style,
    /// Progress steps and info messages (blue)
    pub info: Style,
    pub dim: Style,
    pub bold: Style,
    /// Section titles
    pub header: Style,
}

impl Styles {
    /// Apply colors to the stylesheet.
    pub fn colorize(&mut self) {
        self.passed = Style::new().green();
        self.failed = Style::new().red();
        self.skipped = Style::new().yellow();
        self.info = Style::new().blue();
        self.dim = Style::new().dimmed();
        self.bold = Style::new().bold();
        self.header = Style::new().bold().cyan();
    }

    /// Glyph and style for a module's final status.
    #[must_use]
    pub fn status(&self, status: ModuleStatus) -> (&'static str, Style) {
        match status {
            ModuleStatus::Passed => ("✓", self.passed),
            ModuleStatus::Failed => ("✗", self.failed),
            ModuleStatus::Skipped | ModuleStatus::Cancelled => ("-", self.skipped),
        }
    }

    /// Glyph and style for a single assertion outcome.
    #[must_use]
    pub fn outcome(&self, passed: bool) -> (&'static str, Style) {
        if passed {
            ("✓", self.passed)
        } else {
            ("✗", self.failed)
        }
    }
}
