//! bspcheck CLI - build verification for BSP targets
//!
//! Entry point for the bspcheck command-line application.

use clap::Parser;

use bspcheck::cli::output::{display_error, print_warning};
use bspcheck::cli::Cli;

/// Exit code after Ctrl-C
const INTERRUPTED: i32 = 130;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    // Dropping the run future on interrupt kills running tools and restores
    // any temporarily patched configuration.
    let outcome = tokio::select! {
        result = cli.run() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let code = match outcome {
        Some(Ok(code)) => code,
        Some(Err(e)) => {
            display_error(&e);
            1
        }
        None => {
            print_warning("Interrupted");
            INTERRUPTED
        }
    };
    std::process::exit(code);
}
