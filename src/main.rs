mod cli;
mod command;
mod differ;
mod error;
mod inspector;
mod model;
mod prompt;
mod registry;
mod storage;
mod sync;
mod validation;
mod workflow;
mod writer;

#[cfg(test)]
mod test_support;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use crate::{
    cli::{Cli, Commands},
    command::SystemRunner,
    error::AppError,
    prompt::InquirePrompter,
    storage::{ConfigEnv, Store},
    sync::{Orchestrator, SyncOutcome},
    workflow::{add_repositories, list_tracked, reconfigure},
};

// Main
fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli.command) {
        eprintln!("{}", err.to_string().red());
        std::process::exit(1);
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the level
fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands) -> Result<(), AppError> {
    let store = Store::from_env(&ConfigEnv::from_process())?;
    let runner = SystemRunner;
    let prompter = InquirePrompter;

    match command {
        Commands::Add { repositories, emails } => {
            let keys = add_repositories(&store, &runner, &prompter, &repositories, &emails)?;
            println!("{} {}", "tracking:".green(), keys.join(", "));
            println!(
                "{}",
                "You are all set! Run the \"sync\" command to synchronize your commits.".green()
            );
        }
        Commands::Sync => match Orchestrator::new(&store, &runner, &prompter).run()? {
            SyncOutcome::NothingToSync => println!("{}", "nothing to sync".yellow()),
            SyncOutcome::Synced { commits, pushed } => {
                println!("{} {}", "commits synced:".green(), commits);
                if !pushed {
                    println!("{}", "all new commits were already mirrored".yellow());
                }
            }
        },
        Commands::Config => {
            let config = reconfigure(&store, &runner, &prompter)?;
            if let Some(repository) = config.sync_repository {
                println!("{} {}", "syncing to:".green(), repository.full_name());
            }
            println!("{}", "done".green());
        }
        Commands::List => list_tracked(&store)?,
    }

    Ok(())
}
