use clap::Parser;
use earchive::cli::{default_log_filter, run, Cli};
use earchive_core::exit_status::ExitStatus;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // Help and version requests are not errors.
            return if e.use_stderr() {
                ExitStatus::UsageError.into()
            } else {
                ExitStatus::Success.into()
            };
        }
    };

    // Initialize tracing for the CLI; logs go to stderr so stdout carries only results.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(cli.debug)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let status = run(cli).await;
    if status.is_success() {
        tracing::info!("CLI completed successfully");
    } else {
        tracing::error!(code = status.code(), "CLI exited with error");
    }
    status.into()
}
