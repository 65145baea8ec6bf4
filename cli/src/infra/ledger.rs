//! Infrastructure implementation of the `LedgerStore` port.
//!
//! `LedgerManager` keeps one JSON file per run under `~/.stackcheck/runs/`.
//! Writes go through `tokio::task::spawn_blocking` with an atomic temp file
//! plus rename so a crash never leaves a half-written ledger.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::LedgerStore;
use crate::domain::{RunLedger, validate_run_id};

/// Environment variable overriding the stackcheck home directory.
pub const HOME_ENV: &str = "STACKCHECK_HOME";

/// Run ledger directory manager.
#[derive(Debug, Clone)]
pub struct LedgerManager {
    dir: PathBuf,
}

impl LedgerManager {
    /// Create a manager for `$STACKCHECK_HOME/runs`, defaulting to
    /// `~/.stackcheck/runs`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        let home = match std::env::var_os(HOME_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?
                .join(".stackcheck"),
        };
        Ok(Self::with_dir(home.join("runs")))
    }

    /// Create a manager for an explicit directory (used in tests).
    #[must_use]
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, run_id: &str) -> Result<PathBuf> {
        validate_run_id(run_id)?;
        Ok(self.dir.join(format!("{run_id}.json")))
    }

    fn save_sync(&self, ledger: &RunLedger) -> Result<()> {
        let path = self.path_for(&ledger.run_id)?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating directory {}", self.dir.display()))?;
        let content = serde_json::to_string_pretty(ledger).context("serializing run ledger")?;

        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("setting permissions on {}", temp_path.display()))?;
        }

        std::fs::rename(&temp_path, &path)
            .with_context(|| format!("finalizing run ledger {}", path.display()))?;
        Ok(())
    }

    fn remove_sync(&self, run_id: &str) -> Result<()> {
        let path = self.path_for(run_id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing run ledger {}", path.display())),
        }
    }

    fn list_sync(&self) -> Result<Vec<RunLedger>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.dir.display()));
            }
        };

        let mut ledgers = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("reading {}", self.dir.display()))?
                .path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let parsed = std::fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|content| Ok(serde_json::from_str::<RunLedger>(&content)?));
            match parsed {
                Ok(ledger) if validate_run_id(&ledger.run_id).is_ok() => ledgers.push(ledger),
                Ok(ledger) => {
                    tracing::warn!(
                        path = %path.display(),
                        run_id = %ledger.run_id,
                        "ignoring ledger with invalid run id"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "ignoring unreadable ledger"
                    );
                }
            }
        }
        ledgers.sort_by_key(|l| l.started_at);
        Ok(ledgers)
    }
}

impl LedgerStore for LedgerManager {
    async fn save_async(&self, ledger: &RunLedger) -> Result<()> {
        let mgr = self.clone();
        let ledger = ledger.clone();
        tokio::task::spawn_blocking(move || mgr.save_sync(&ledger))
            .await
            .context("ledger save task panicked")?
    }

    async fn remove_async(&self, run_id: &str) -> Result<()> {
        let mgr = self.clone();
        let run_id = run_id.to_string();
        tokio::task::spawn_blocking(move || mgr.remove_sync(&run_id))
            .await
            .context("ledger remove task panicked")?
    }

    async fn list_async(&self) -> Result<Vec<RunLedger>> {
        let mgr = self.clone();
        tokio::task::spawn_blocking(move || mgr.list_sync())
            .await
            .context("ledger list task panicked")?
    }
}
