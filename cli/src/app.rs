//! Application context — unified state passed to every command handler.
//!
//! `AppContext` carries output settings and builds the infrastructure
//! adapters a command needs, so command signatures stay stable as
//! cross-cutting concerns are added.

use anyhow::Result;

use crate::domain::Settings;
use crate::infra::aws::AwsCliStateReader;
use crate::infra::command_runner::{DEFAULT_CMD_TIMEOUT, TokioCommandRunner};
use crate::infra::ledger::LedgerManager;
use crate::infra::terraform::TerraformProvisioner;
use crate::output::{HumanRenderer, OutputContext};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Set when the `CI` or `STACKCHECK_YES` environment variables are present.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// JSON mode implies quiet terminal output so stdout carries only the
    /// JSON document.
    #[must_use]
    pub fn new(flags: &OutputFlags) -> Self {
        let non_interactive =
            std::env::var_os("CI").is_some() || std::env::var_os("STACKCHECK_YES").is_some();

        let mode = if flags.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        Self {
            output: OutputContext::new(flags.no_color, flags.quiet || flags.json),
            mode,
            non_interactive,
        }
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Human renderer over this context's output settings.
    #[must_use]
    pub fn renderer(&self) -> HumanRenderer<'_> {
        HumanRenderer::new(&self.output)
    }

    /// Engine adapter for `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error if the retry settings are invalid.
    pub fn provisioner(
        &self,
        settings: &Settings,
    ) -> Result<TerraformProvisioner<TokioCommandRunner>> {
        let timeout = settings.timeouts.longest();
        let runner = TokioCommandRunner::new(timeout).with_env("TF_IN_AUTOMATION", "1");
        Ok(TerraformProvisioner::new(
            runner,
            &settings.binary,
            settings.retry.policy()?,
            timeout,
        ))
    }

    /// Live resource state reader.
    #[must_use]
    pub fn reader(&self) -> AwsCliStateReader<TokioCommandRunner> {
        AwsCliStateReader::new(TokioCommandRunner::new(DEFAULT_CMD_TIMEOUT))
    }

    /// Run ledger store.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn ledger(&self) -> Result<LedgerManager> {
        LedgerManager::new()
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI, `--yes` flag, or `STACKCHECK_YES`),
    /// returns `true` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, yes: bool) -> Result<bool> {
        if yes || self.non_interactive {
            return Ok(true);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        Ok(confirmed)
    }
}
