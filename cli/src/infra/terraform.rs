//! Infrastructure implementation of the `Provisioner` port.
//!
//! `TerraformProvisioner<R>` drives `terraform`, `tofu` or `terragrunt`
//! through a `CommandRunner`. Transient failures are retried with backoff
//! according to the configured `RetryPolicy`.

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use crate::application::ports::{CommandRunner, Provisioner};
use crate::domain::{
    AppliedModule, DestroyError, ModuleDescriptor, OutputError, ProvisionError, ProvisionHandle,
    RetryPolicy, Variables,
};

/// Engine message for a module whose state holds nothing to destroy.
const NO_STATE: &str = "No state file was found";

/// Provider not-found codes. They only count inside a `deleting` diagnostic.
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidVpcID.NotFound",
    "InvalidSubnetID.NotFound",
    "InvalidGroup.NotFound",
    "DBInstanceNotFound",
    "DBSubnetGroupNotFoundFault",
    "ClusterNotFoundException",
    "ResourceNotFoundException",
];

/// Longest engine message carried into a report.
const MAX_MESSAGE_LINES: usize = 20;

/// Infrastructure adapter that routes all engine calls through a `CommandRunner`.
///
/// Generic over `R: CommandRunner` so that tests can inject a scripted runner
/// without spawning real processes.
pub struct TerraformProvisioner<R: CommandRunner> {
    runner: R,
    binary: String,
    policy: RetryPolicy,
    /// Ceiling for a single engine command.
    timeout: Duration,
}

impl<R: CommandRunner> TerraformProvisioner<R> {
    pub fn new(runner: R, binary: &str, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            runner,
            binary: binary.to_string(),
            policy,
            timeout,
        }
    }

    fn is_terragrunt(&self) -> bool {
        Path::new(&self.binary)
            .file_name()
            .is_some_and(|name| name == "terragrunt")
    }

    /// Arguments for `subcommand` run against `dir`, before any extra flags.
    fn base_args(&self, dir: &Path, subcommand: &str) -> Vec<String> {
        let dir = dir.display().to_string();
        if self.is_terragrunt() {
            vec![
                subcommand.to_string(),
                "--working-dir".to_string(),
                dir,
                "-no-color".to_string(),
            ]
        } else {
            vec![
                format!("-chdir={dir}"),
                subcommand.to_string(),
                "-no-color".to_string(),
            ]
        }
    }

    /// Run the engine, retrying failures the policy classifies as transient.
    ///
    /// Returns the engine's message on final failure.
    async fn run_engine(&self, module: &str, args: &[String]) -> Result<Output, String> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let mut attempt = 0;
        loop {
            let message = match self
                .runner
                .run_with_timeout(&self.binary, &args, self.timeout)
                .await
            {
                Ok(output) if output.status.success() => return Ok(output),
                Ok(output) => engine_message(&output),
                Err(e) => format!("{e:#}"),
            };

            let retryable = self.policy.classify(&message);
            match retryable {
                Some(why) if attempt < self.policy.max_retries => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        module,
                        command = args.first().copied().unwrap_or_default(),
                        attempt = attempt + 1,
                        max_retries = self.policy.max_retries,
                        reason = why,
                        delay_secs = delay.as_secs(),
                        "retryable engine error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                _ => return Err(message),
            }
        }
    }
}

impl<R: CommandRunner> Provisioner for TerraformProvisioner<R> {
    async fn apply(
        &self,
        module: &ModuleDescriptor,
        vars: &Variables,
    ) -> Result<AppliedModule, ProvisionError> {
        let failed = |message: String| ProvisionError::Failed {
            module: module.id.clone(),
            message,
        };

        let mut init = self.base_args(&module.dir, "init");
        init.push("-input=false".to_string());
        self.run_engine(&module.id, &init).await.map_err(failed)?;

        let mut apply = self.base_args(&module.dir, "apply");
        apply.extend(["-auto-approve".to_string(), "-input=false".to_string()]);
        apply.extend(var_args(vars));
        self.run_engine(&module.id, &apply).await.map_err(failed)?;

        Ok(AppliedModule {
            descriptor: module.clone(),
            handle: ProvisionHandle {
                dir: module.dir.clone(),
                vars: vars.clone(),
            },
            applied_at: Utc::now(),
        })
    }

    async fn destroy(&self, module: &AppliedModule) -> Result<(), DestroyError> {
        let dir = &module.handle.dir;
        if !dir.exists() {
            tracing::error!(
                module = module.id(),
                dir = %dir.display(),
                "module dir is gone, cannot destroy"
            );
            return Err(DestroyError::Failed {
                module: module.id().to_string(),
                message: format!("module dir {} is gone, cannot destroy", dir.display()),
            });
        }

        let mut args = self.base_args(dir, "destroy");
        args.extend(["-auto-approve".to_string(), "-input=false".to_string()]);
        args.extend(var_args(&module.handle.vars));
        match self.run_engine(module.id(), &args).await {
            Ok(_) => Ok(()),
            Err(message) if is_already_gone(&message) => {
                tracing::info!(module = module.id(), "resources already gone");
                Ok(())
            }
            Err(message) => Err(DestroyError::Failed {
                module: module.id().to_string(),
                message,
            }),
        }
    }

    async fn output(&self, module: &AppliedModule, name: &str) -> Result<Value, OutputError> {
        let mut args = self.base_args(&module.handle.dir, "output");
        args.push("-json".to_string());
        let output = self
            .run_engine(module.id(), &args)
            .await
            .map_err(|message| OutputError::Unavailable {
                module: module.id().to_string(),
                message,
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_output(module.id(), &stdout, name)
    }
}

/// `-var name=value` pairs. Strings are passed raw; everything else as JSON,
/// which the engine accepts as an HCL literal.
#[must_use]
pub fn var_args(vars: &Variables) -> Vec<String> {
    vars.iter()
        .flat_map(|(name, value)| {
            let literal = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            ["-var".to_string(), format!("{name}={literal}")]
        })
        .collect()
}

/// Pick output `name` from `output -json`, which maps each output name to
/// `{"sensitive": .., "type": .., "value": ..}`.
///
/// # Errors
///
/// Returns `OutputError::Missing` if `name` is absent and
/// `OutputError::Unavailable` if the document is not valid JSON.
pub fn parse_output(module: &str, json: &str, name: &str) -> Result<Value, OutputError> {
    let doc: Value = serde_json::from_str(json).map_err(|e| OutputError::Unavailable {
        module: module.to_string(),
        message: format!("invalid output JSON: {e}"),
    })?;
    doc.get(name)
        .and_then(|entry| entry.get("value"))
        .cloned()
        .ok_or_else(|| OutputError::Missing {
            module: module.to_string(),
            name: name.to_string(),
        })
}

/// Whether a destroy failure only says the resources no longer exist.
///
/// Every `Error:` line must be a `deleting` diagnostic carrying a provider
/// not-found code; backend or configuration errors never qualify.
#[must_use]
pub fn is_already_gone(message: &str) -> bool {
    if message.contains(NO_STATE) {
        return true;
    }
    let mut errors = message
        .lines()
        .map(str::trim_start)
        .filter(|line| line.starts_with("Error:"))
        .peekable();
    errors.peek().is_some()
        && errors.all(|line| {
            line.contains("deleting") && NOT_FOUND_CODES.iter().any(|code| line.contains(code))
        })
}

/// The engine's diagnostic: stderr from the first `Error:` line, else stderr,
/// else stdout, else the exit status.
fn engine_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = [stderr.trim(), stdout.trim()]
        .into_iter()
        .find(|t| !t.is_empty())
        .unwrap_or_default();
    if text.is_empty() {
        return format!("exited with {}", output.status);
    }
    let from_error = text.find("Error:").map_or(text, |at| &text[at..]);
    from_error
        .lines()
        .take(MAX_MESSAGE_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}
