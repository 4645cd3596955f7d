//! Command line interface

pub mod commands;
pub mod context;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::collections::handle_collections_command;
use commands::cursor::{CursorCommands, handle_cursor_command};
use commands::sync::{SyncArgs, handle_reconcile_command, handle_site_command, handle_sync_command};
use context::AppContext;

#[derive(Parser, Debug)]
#[command(
    name = "mfr-sync",
    version,
    about = "Sync health facilities from a Resource Map registry into DHIS2"
)]
pub struct Cli {
    /// Config file (defaults to <config dir>/mfr-sync/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile the hierarchy, then sync facility streams
    Sync(SyncArgs),
    /// Reconcile the administrative hierarchy only
    Reconcile,
    /// List registry collections
    Collections,
    /// Sync a single registry site without moving any cursor
    Site {
        /// Registry site id
        id: String,
    },
    /// Inspect or reset stream cursors
    #[command(subcommand)]
    Cursor(CursorCommands),
}

pub async fn run(cli: Cli) -> Result<()> {
    if cli.no_color {
        colored::control::set_override(false);
    }

    let pinned = init_logging(cli.verbose);
    let ctx = AppContext::load(cli.config.as_deref())?;
    if !pinned {
        log::set_max_level(ctx.resilience.monitoring.log_level.to_filter());
    }

    match cli.command {
        Commands::Sync(args) => handle_sync_command(&ctx, args).await,
        Commands::Reconcile => handle_reconcile_command(&ctx).await,
        Commands::Collections => handle_collections_command(&ctx).await,
        Commands::Site { id } => handle_site_command(&ctx, &id).await,
        Commands::Cursor(command) => handle_cursor_command(&ctx, command).await,
    }
}

/// Level requested with `-v` flags
fn flag_level(verbose: u8) -> Option<log::LevelFilter> {
    match verbose {
        0 => None,
        1 => Some(log::LevelFilter::Info),
        2 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    }
}

/// Start logging before any config is read. `RUST_LOG` wins, then `-v`
/// flags. Returns `false` when neither was given; the level is then info
/// until the configured level is applied.
fn init_logging(verbose: u8) -> bool {
    let from_env = std::env::var_os(env_logger::DEFAULT_FILTER_ENV).is_some();
    let flagged = flag_level(verbose);
    let default = flagged.unwrap_or(log::LevelFilter::Trace);
    let env = env_logger::Env::default().default_filter_or(default.as_str());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_secs()
        .try_init();

    if from_env || flagged.is_some() {
        return true;
    }
    log::set_max_level(log::LevelFilter::Info);
    false
}
