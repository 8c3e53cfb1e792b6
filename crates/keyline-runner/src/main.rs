//! `keyline` binary.

use clap::Parser;
use keyline_runner::{error_kind, execute, summary, Cli, Commands};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the contour path.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();

    let outcome = match &cli.command {
        Commands::Contours(args) => execute(args),
    };

    match outcome {
        Ok(result) => {
            eprintln!("{}", summary(&result));
            println!("{}", result.contours_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            match error_kind(&e) {
                Some(kind) => eprintln!("Error ({kind}): {e:#}"),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
