//! `sync`, `reconcile` and `site` commands

pub mod handler;

use clap::{Args, ValueEnum};

pub use handler::{handle_reconcile_command, handle_site_command, handle_sync_command};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Which facility stream to sync
    #[arg(value_enum, default_value_t = StreamArg::All)]
    pub stream: StreamArg,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamArg {
    Added,
    Updated,
    All,
}
