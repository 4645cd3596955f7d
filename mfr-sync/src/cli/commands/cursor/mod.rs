//! `cursor` command

pub mod handler;

use clap::{Subcommand, ValueEnum};

pub use handler::handle_cursor_command;

#[derive(Subcommand, Debug)]
pub enum CursorCommands {
    /// Show the persisted cursors
    Show,
    /// Set a cursor back to a timestamp (default: the configured initial value)
    Reset {
        #[arg(value_enum)]
        kind: CursorKind,
        /// Timestamp like 2024-01-01T00:00:00Z
        timestamp: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorKind {
    Added,
    Updated,
    All,
}
