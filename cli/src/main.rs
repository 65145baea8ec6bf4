//! stackcheck - provision, validate and tear down infrastructure modules

use std::process::ExitCode;

use clap::Parser;
use stackcheck_cli::cli::Cli;
use stackcheck_cli::output::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json_errors = cli.wants_json();
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            if json_errors {
                match json::format_error(&format!("{e:#}"), "error") {
                    Ok(doc) => println!("{doc}"),
                    Err(_) => eprintln!("Error: {e:#}"),
                }
            } else {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}
