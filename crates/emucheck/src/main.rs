//! emucheck CLI - emulator trace diff and ROM regression runner

mod cli;
mod commands;
mod terminal;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    // Initialize metrics recorder if enabled
    let metrics_handle = if cli.metrics {
        emucheck::metrics::CliRecorder::new().install()
    } else {
        None
    };

    emucheck::metrics::init();

    // RUST_LOG wins; otherwise pick a level from the flags and command
    let level = if cli.verbose {
        "debug"
    } else if cli.silent {
        "error"
    } else {
        match &cli.command {
            Commands::Test { .. } => "warn",
            Commands::Diff { .. } => "info",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("emucheck={level},emucheck_trace={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let exit_code = commands::run_command(&cli);

    if let Some(handle) = metrics_handle {
        handle.print_summary();
    }

    std::process::exit(exit_code);
}
