//! shoal CLI entry point.
//!
//! Usage:
//!   shoal                      # Interactive REPL
//!   shoal -c <command>         # Execute command and exit
//!   shoal script.sh            # Run a script

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shoal_kernel::Evaluator;

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        None => {
            shoal_repl::run()?;
            Ok(ExitCode::SUCCESS)
        }

        Some("--help" | "-h") => {
            print_help();
            Ok(ExitCode::SUCCESS)
        }

        Some("--version" | "-V") => {
            println!("shoal {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }

        Some("-c") => {
            let cmd = args.get(2).context("-c requires a command argument")?;
            evaluate("-c", cmd)
        }

        Some(path) if !path.starts_with('-') => {
            // A leading `#!` line is an ordinary comment to the lexer.
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read script: {path}"))?;
            evaluate(path, &source)
        }

        Some(unknown) => {
            eprintln!("Unknown option: {unknown}");
            eprintln!("Run 'shoal --help' for usage.");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_help() {
    println!(
        r#"shoal v{}

Usage:
  shoal                        Interactive REPL
  shoal -c <command>           Execute command and exit
  shoal <script>               Run a script file

Options:
  -c <command>                 Execute command string and exit
  -h, --help                   Show this help
  -V, --version                Show version

Environment:
  RUST_LOG                     Log filter, e.g. RUST_LOG=shoal_kernel=debug
"#,
        env!("CARGO_PKG_VERSION")
    );
}

/// Evaluate one source text on the host streams. Exit status 1 on error.
fn evaluate(name: &str, source: &str) -> Result<ExitCode> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let mut evaluator = Evaluator::new();
    let result = rt.block_on(evaluator.eval_source(name, source));

    // Background jobs die with the runtime; let them finish first. Their
    // errors were already written to their own port 2.
    let jobs = rt.block_on(evaluator.wait_jobs());
    tracing::debug!(jobs = jobs.len(), "background jobs finished");

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
