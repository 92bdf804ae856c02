//! strata CLI - an AUR helper that installs in dependency layers

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use strata::installer::InstallError;
use strata::resolver::ResolveError;
use strata::util::diagnostic::emit;
use strata::util::errors::AggregateError;
use strata::util::shell::ColorChoice;

fn main() {
    let cli = Cli::parse();
    let color = match cli.color.parse::<ColorChoice>() {
        Ok(ColorChoice::Always) => true,
        Ok(ColorChoice::Never) => false,
        _ => std::io::stderr().is_terminal(),
    };

    if let Err(e) = run(cli) {
        std::process::exit(report(&e, color));
    }
}

/// Print `err` and return the exit status it maps to.
fn report(err: &anyhow::Error, color: bool) -> i32 {
    for cause in err.chain() {
        if let Some(install) = cause.downcast_ref::<InstallError>() {
            let rolled_up = err
                .downcast_ref::<AggregateError>()
                .and_then(|aggregate| aggregate.errors().split_last())
                .map(|(_, rest)| rest)
                .unwrap_or_default();
            for e in rolled_up {
                eprintln!("error: {:#}", e);
            }
            emit(&install.to_diagnostic(), color);
            return install.exit_code();
        }
        if let Some(resolve) = cause.downcast_ref::<ResolveError>() {
            emit(&resolve.to_diagnostic(), color);
            return 1;
        }
    }
    eprintln!("error: {:#}", err);
    1
}

fn run(cli: Cli) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("strata=debug")
    } else {
        EnvFilter::new("strata=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let global = commands::GlobalArgs {
        verbose: cli.verbose,
        quiet: cli.quiet,
        color: cli.color,
        config: cli.config,
    };

    match cli.command {
        Commands::Install(args) => commands::install::execute(&global, args),
        Commands::Upgrade(args) => commands::upgrade::execute(&global, args),
        Commands::Gendb => commands::gendb::execute(&global),
        Commands::Graph(args) => commands::graph::execute(&global, args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
