use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI arguments parser using `clap`
#[derive(Parser, Debug)]
#[command(
    name = "contribution-mate",
    version,
    about = "Mirror commit timestamps from local repositories to your GitHub profile"
)]
pub struct Cli {
    /// Print progress logs to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Subcommand chosen to execute
    #[command(subcommand)]
    pub command: Commands,
}

// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Adds one or more local repositories for syncing
    Add {
        /// Paths of local Git repositories
        #[arg(required = true)]
        repositories: Vec<PathBuf>,
        /// Email of an author to sync, skips the selection prompt
        #[arg(short, long = "email")]
        emails: Vec<String>,
    },
    /// Mirrors new commits to the sync repository
    Sync,
    /// Sets up the commit author and sync repository again
    Config,
    /// Displays tracked repositories and configuration
    List,
}
