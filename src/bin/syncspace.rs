//! Syncspace CLI Binary
//!
//! Command-line interface for importing GitHub repositories into workspace rooms.

use anyhow::Context;
use clap::Parser;
use std::process;
use syncspace::logging::{init_logging, LoggingOverrides};
use syncspace::tooling::cli::{Cli, CliContext};

fn logging_overrides(cli: &Cli) -> LoggingOverrides {
    LoggingOverrides {
        verbose: cli.verbose,
        level: cli.log_level.clone(),
        format: cli.log_format.clone(),
        output: cli.log_output.clone(),
        file: cli.log_file.clone(),
    }
}

async fn run(cli: Cli) -> anyhow::Result<String> {
    let context = CliContext::new(cli.config.clone()).context("Error loading configuration")?;
    let logging = context.config().logging.with_overrides(&logging_overrides(&cli));
    init_logging(Some(&logging)).context("Error initializing logging")?;
    Ok(context.execute(&cli.command).await?)
}

fn main() {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            process::exit(1);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
