//! Secure Import CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use secure_import_cli::commands::{dispatch, print_version, version_requested, Cli};
use secure_import_core::log::{LogFormat, DEFAULT_LOG_FILTER};

fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() {
    // `--version` doubles as the chart version flag; bare, it prints ours.
    let args: Vec<String> = std::env::args().skip(1).collect();
    if version_requested(&args) {
        print_version();
        return;
    }

    let cli = Cli::parse();
    init_tracing(cli.log_format);

    if let Err(e) = dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
