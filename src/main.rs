mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod resource;
mod runner;

use clap::Parser;
use cli::{Cli, Command};
use commands::{CommandError, CommandResult};
use config::ConvergeConfig;
use reconcile::Registry;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub config: ConvergeConfig,
    pub registry: Registry,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity; stderr is the diagnostic channel
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> CommandResult<()> {
    let config = ConvergeConfig::load(cli.config.as_deref())?;
    let ctx = Context {
        config,
        registry: resource::registry(),
    };

    match cli.into_command() {
        Command::Apply(args) => commands::apply::run(&ctx, &args),
        Command::Describe { kind } => commands::describe::run(&ctx, kind.as_deref()),
    }
}

/// Print the failure and its structured detail on stderr
fn report(error: &CommandError) {
    eprintln!("Error: {error:#}");
    if let Some(details) = error.details() {
        eprintln!("{details}");
    }
}
