//! CLI command definitions and dispatch.

mod import;

use clap::Parser;
use secure_import_core::LogFormat;

pub use import::ImportArgs;

/// Secure Import - copy a chart and all of its images into a private registry,
/// scanning, patching and signing them on the way.
#[derive(Parser, Debug)]
#[command(
    name = "secure-import",
    about,
    disable_version_flag = true,
    after_help = "Environment variables:\n  HELM_REGISTRY    Registry URL (alternative to --registry)\n  HELM_SIGN_KEY    Signing key path (alternative to --sign-key)"
)]
pub struct Cli {
    #[command(flatten)]
    pub import: ImportArgs,

    /// Log output format (text, json)
    #[arg(long, value_name = "FORMAT", default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Print the tool version and exit
    #[arg(short = 'V', long = "tool-version")]
    pub tool_version: bool,
}

/// Whether `args` ask for the tool version: `-version` anywhere, or a
/// `--version` flag with no value following it. `--version 1.2.3` is the
/// chart version instead.
pub fn version_requested(args: &[String]) -> bool {
    args.iter().enumerate().any(|(i, arg)| match arg.as_str() {
        "-version" => true,
        "--version" => args.get(i + 1).map_or(true, |next| next.starts_with('-')),
        _ => false,
    })
}

pub fn print_version() {
    println!("secure-import version {}", secure_import_core::VERSION);
}

/// Dispatch the parsed command line.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.tool_version {
        print_version();
        return Ok(());
    }
    import::execute(cli.import).await
}
