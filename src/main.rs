//! Binary entry point for the distillation CLI.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::Parser;
use std::io::{self, Write};
use std::process::ExitCode;
use unified_distill::cli::{Cli, OutputFormat, execute, format_error};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(io::stderr)
        .init();

    let format = OutputFormat::parse(&cli.output);

    match execute(&cli).await {
        Ok(output) => {
            if !output.is_empty() {
                // Handle broken pipe gracefully (e.g. when piped to `head`)
                if let Err(e) = writeln!(io::stdout(), "{output}")
                    && e.kind() != io::ErrorKind::BrokenPipe
                {
                    eprintln!("Error writing to stdout: {e}");
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            let rendered = format_error(&e, format);
            match format {
                OutputFormat::Json => println!("{rendered}"),
                OutputFormat::Text => eprintln!("Error: {rendered}"),
            }
            ExitCode::FAILURE
        }
    }
}
