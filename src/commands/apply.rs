//! Execute one request and print the resulting state

use anyhow::{Context as _, Result};
use reconcile::{CommandRunner, Engine, Registry, Request, serializer};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use super::CommandResult;
use crate::Context;
use crate::cli::ApplyArgs;
use crate::config::ConvergeConfig;
use crate::progress::Progress;
use crate::runner::SystemRunner;

pub fn run(ctx: &Context, args: &ApplyArgs) -> CommandResult<()> {
    let input = read_input(args.input.as_deref())?;
    let request = prepare(&input, &ctx.config, args)?;
    let pretty = args.pretty || ctx.config.output.pretty;

    let output = execute(&request, &ctx.registry, &SystemRunner, pretty)?;
    println!("{output}");
    Ok(())
}

/// Read the whole request before anything is processed
fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read request from {}", path.display())),
        None => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read request from stdin")?;
            Ok(input)
        }
    }
}

/// Parse the request and fill in facts and noop from the CLI and config
fn prepare(input: &str, config: &ConvergeConfig, args: &ApplyArgs) -> CommandResult<Request> {
    let mut request = Request::from_json(input)?;

    let defaults = config.facts.defaults(args.detect_facts);
    let facts = request.facts().merged_over(&defaults);
    log::debug!("Facts for '{}': {facts}", request.kind());
    request.set_facts(facts);

    let noop = args.noop || request.noop() || config.execution.noop;
    request.set_noop(noop);

    Ok(request)
}

fn execute(
    request: &Request,
    registry: &Registry,
    runner: &dyn CommandRunner,
    pretty: bool,
) -> CommandResult<String> {
    let mut progress = Progress::new();
    let result = Engine::new(registry, runner).execute(request, &mut progress);
    log::info!("{}: {}", request.kind(), progress.summary());

    let outcome = result?;
    log::info!("{}: {:?}", request.kind(), outcome.status);
    Ok(serializer::to_json(&outcome.state, pretty))
}
