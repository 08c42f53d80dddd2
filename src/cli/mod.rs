//! Command-line interface for Gator.
//!
//! Argument parsing with clap and dispatch to the command handlers. This is
//! the only layer that turns errors into a process exit status.

mod handlers;

pub use handlers::CommandContext;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

use crate::config::Config;
use crate::db::Database;
use crate::Result;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "gator.toml";

/// Gator - a command-line RSS/Atom feed aggregator.
#[derive(Parser, Debug)]
#[command(name = "gator", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// Gator commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a user and log in as them.
    Register { name: String },
    /// Log in as an existing user.
    Login { name: String },
    /// Delete all users, feeds, follows and posts.
    Reset,
    /// List users.
    Users,
    /// Add a feed and follow it.
    #[command(name = "addfeed")]
    AddFeed { name: String, url: String },
    /// List all feeds.
    Feeds,
    /// Follow an existing feed by URL.
    Follow { url: String },
    /// List the feeds you follow.
    Following,
    /// Stop following a feed by URL.
    Unfollow { url: String },
    /// Show the newest posts from the feeds you follow.
    Browse { limit: Option<i64> },
    /// Fetch feeds forever, one per interval (e.g. `30s`, `1m`, `1h30m`).
    Agg { interval: String },
}

/// Open the database and run one command, writing output to stdout.
pub async fn run(command: Command, config: &Config) -> Result<()> {
    let db = Database::from_config(&config.database).await?;
    let ctx = CommandContext::new(config, &db);

    let mut out = std::io::stdout();
    let result = ctx.execute(command, &mut out).await;

    db.close().await;
    result
}

/// Run a command and map the outcome to an exit status.
pub async fn main_with(cli: Cli, config: &Config) -> ExitCode {
    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
