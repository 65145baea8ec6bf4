//! Command implementations

pub mod cleanup;
pub mod plan;
pub mod run;
pub mod version;

use std::path::PathBuf;

use clap::Args;

use crate::infra::config::DEFAULT_SUITE_FILE;

/// Suite selection shared by `run` and `plan`.
#[derive(Args, Debug, Clone)]
pub struct SuiteArgs {
    /// Suite file to load
    #[arg(long, env = "STACKCHECK_SUITE", default_value = DEFAULT_SUITE_FILE)]
    pub suite: PathBuf,

    /// Only run these modules (repeatable); prerequisites outside the
    /// selection are reported as unmet
    #[arg(long = "only", value_name = "ID")]
    pub only: Vec<String>,
}
