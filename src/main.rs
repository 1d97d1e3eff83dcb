//! autoballoon CLI entry point.

use autoballoon::BalloonController;
use clap::Parser;
use cli::{LogFormat, LogLevel};
use tracing_subscriber::EnvFilter;

mod cli;

/// autoballoon - keep a libvirt domain's balloon sized to its usage
#[derive(Parser, Debug)]
#[command(name = "autoballoon")]
#[command(about = "Memory balloon controller for a libvirt domain")]
#[command(version)]
struct Cli {
    /// Logging level (ignored when RUST_LOG is set).
    #[arg(
        long = "log-level",
        alias = "logLevel",
        value_enum,
        ignore_case = true,
        default_value = "info"
    )]
    log_level: LogLevel,

    /// Log line format.
    #[arg(long = "log-format", value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(flatten)]
    control: cli::ControlArgs,
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.log_level, cli.log_format);

    tracing::debug!(version = autoballoon::VERSION, "starting autoballoon");

    let result = cli
        .control
        .resolve()
        .and_then(BalloonController::new)
        .and_then(|controller| controller.run());

    if let Err(e) = result {
        tracing::error!(error = %e, "controller failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber.
fn init_logging(level: LogLevel, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}
