//! Agent Operator Binary
//!
//! Command-line entry point: loads configuration, initializes logging and
//! runs the requested command.

use agent_operator::config::ConfigLoader;
use agent_operator::logging::init_logging;
use agent_operator::tooling::cli::{Cli, CliContext};
use anyhow::Context;
use clap::Parser;
use std::process;

fn run(cli: &Cli) -> anyhow::Result<String> {
    let config = ConfigLoader::load(cli.config.as_deref()).context("Error loading configuration")?;

    if let Err(e) = init_logging(Some(&cli.logging_config(&config.logging))) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let context = CliContext::new(config).context("Error initializing operator")?;
    Ok(context.execute(&cli.command)?)
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
