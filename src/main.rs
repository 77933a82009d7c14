//! housing-dashboard - Housing price data app
//!
//! Usage:
//!   housing-dashboard serve                    # Dashboard on 127.0.0.1:8501
//!   housing-dashboard serve --file data.csv    # Use a local CSV
//!   housing-dashboard train --json             # Fit report as JSON
//!   housing-dashboard predict --rm 6.5 ...     # One prediction

use clap::Parser;
use housing_dashboard::cli::{execute_command, log_filter, Cli};
use housing_dashboard::output;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(verbose: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter(rust_log.as_deref(), verbose))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute_command(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string());
            e.exit_code()
        }
    }
}
