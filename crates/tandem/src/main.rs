//! Tandem CLI - parallel git worktree sessions with leases and auto-merging
//!
//! Binary name: `tandem`
//!
//! Every command prints one JSON document on stdout (`list` without `--json`
//! prints a table). Logs go to stderr, filtered by `RUST_LOG`.

use std::process;

mod cli;

use cli::{
    handlers::{format_error, run_cli},
    output::{print_error, print_untyped_error, ReportedFailure},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run_cli().await {
        let code = if let Some(reported) = err.downcast_ref::<ReportedFailure>() {
            reported.exit_code
        } else if let Some(core) = err.downcast_ref::<tandem_core::Error>() {
            print_error(core);
            core.exit_code()
        } else {
            print_untyped_error(format_error(&err));
            2
        };

        tracing::debug!("Exiting with code {code}: {err:#}");

        #[allow(clippy::exit)]
        process::exit(code);
    }
}
