use anyhow::{Context, Result};
use colored::*;

use crate::cli::context::AppContext;
use mfr_sync::api::SourceRegistry;

pub async fn handle_collections_command(ctx: &AppContext) -> Result<()> {
    let registry = ctx.registry()?;
    let collections = registry
        .collections()
        .await
        .context("Failed to list registry collections")?;

    if collections.is_empty() {
        println!("{}", "No collections visible to this account".yellow());
        return Ok(());
    }

    let configured = ctx.config.registry.collection.trim();
    for collection in &collections {
        let marker = if collection.name.trim().eq_ignore_ascii_case(configured) {
            "*".bright_green().bold()
        } else {
            " ".normal()
        };
        println!("{} {:>8}  {}", marker, collection.id.to_string().dimmed(), collection.name);
    }
    Ok(())
}
