use anyhow::{Context, Result};
use colored::*;

use super::{CursorCommands, CursorKind};
use crate::cli::context::AppContext;
use mfr_sync::sync::{CursorStore, StreamKind, parse_timestamp};

pub async fn handle_cursor_command(ctx: &AppContext, command: CursorCommands) -> Result<()> {
    match command {
        CursorCommands::Show => show(ctx).await,
        CursorCommands::Reset { kind, timestamp } => reset(ctx, kind, timestamp).await,
    }
}

async fn show(ctx: &AppContext) -> Result<()> {
    println!("Cursors in {}", ctx.cursors.dir().display().to_string().dimmed());
    for kind in StreamKind::all() {
        let value = ctx
            .cursors
            .get(kind)
            .await
            .with_context(|| format!("Failed to read cursor '{}'", kind.cursor_key()))?;
        match value {
            Some(value) => println!("  {:<14} {}", kind.cursor_key(), value.bright_green()),
            None => println!(
                "  {:<14} {} (starts at {})",
                kind.cursor_key(),
                "not set".yellow(),
                ctx.config.cursor.initial
            ),
        }
    }
    Ok(())
}

async fn reset(ctx: &AppContext, kind: CursorKind, timestamp: Option<String>) -> Result<()> {
    let value = timestamp.unwrap_or_else(|| ctx.config.cursor.initial.clone());
    if parse_timestamp(&value).is_none() {
        anyhow::bail!("Invalid timestamp '{}', expected e.g. 2024-01-01T00:00:00Z", value);
    }

    let kinds: Vec<StreamKind> = match kind {
        CursorKind::Added => vec![StreamKind::Added],
        CursorKind::Updated => vec![StreamKind::Updated],
        CursorKind::All => StreamKind::all().to_vec(),
    };
    for kind in kinds {
        ctx.cursors
            .set(kind, &value)
            .await
            .with_context(|| format!("Failed to write cursor '{}'", kind.cursor_key()))?;
        println!("{} {} -> {}", "Reset".bright_green(), kind.cursor_key(), value);
    }
    Ok(())
}
